//! Buffered copy loop and byte-counting adapters shared by both codecs.

mod local;

pub use local::{create_dest, ensure_distinct, finish_dest, open_source, remove_failed_output};

use std::io::{self, Read, Write};

use crate::error::{CodecError, Result};

/// Size of the buffer every copy loop streams through.
pub const BUFFER_SIZE: usize = 8192;

/// Copy `reader` into `writer` through a fixed [`BUFFER_SIZE`] buffer.
///
/// Read faults are classified by `read_error` (a decoder reports corrupt
/// input there), write faults are always [`CodecError::Io`]. Returns the
/// number of bytes copied.
pub fn copy_buffered<R, W, F>(reader: &mut R, writer: &mut W, read_error: F) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    F: Fn(io::Error) -> CodecError,
{
    let mut buf = [0u8; BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_error(e)),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }

    Ok(total)
}

/// Reader adapter that counts the bytes taken from the inner reader.
pub struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

/// Writer adapter that counts the bytes handed to the inner writer.
pub struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
