//! GZIP stream codec.
//!
//! Every operation streams through the fixed [`BUFFER_SIZE`](crate::io::BUFFER_SIZE)
//! copy loop, so file size is bounded only by the disk. The stream-level
//! functions work on any [`Read`]/[`Write`] pair and report errors; the
//! file-level functions implement the public contract and fold every error
//! into a failed [`OperationResult`].

use std::fs;
use std::io::{self, BufWriter, Cursor, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use tracing::{error, info};

use crate::error::{CodecError, Result};
use crate::io::{
    CountingReader, CountingWriter, copy_buffered, create_dest, ensure_distinct, finish_dest,
    open_source, remove_failed_output,
};
use crate::stats::OperationResult;

/// GZIP magic bytes (RFC 1952).
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Byte counts of a finished stream operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    /// Bytes consumed from the source.
    pub bytes_in: u64,
    /// Bytes handed to the destination.
    pub bytes_out: u64,
}

/// Compress `source` into a single GZIP member written to `dest`.
///
/// The encoder is finished and `dest` flushed before returning, so
/// `bytes_out` is the exact length of the envelope.
pub fn compress_stream<R, W>(source: &mut R, dest: &mut W) -> Result<StreamStats>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut encoder = GzEncoder::new(CountingWriter::new(dest), Compression::default());
    let bytes_in = copy_buffered(source, &mut encoder, CodecError::Io)?;

    let mut sink = encoder.finish()?;
    sink.flush()?;

    Ok(StreamStats {
        bytes_in,
        bytes_out: sink.count(),
    })
}

/// Decompress every GZIP member in `source` into `dest`.
///
/// Concatenated members decode as one stream, the way `gzip -d` reads them.
/// Input that does not start with the GZIP magic bytes, whose payload,
/// CRC-32 or length trailer is invalid, or that carries trailing bytes which
/// are not another member, fails with [`CodecError::Format`].
pub fn decompress_stream<R, W>(source: R, dest: &mut W) -> Result<StreamStats>
where
    R: Read,
    W: Write + ?Sized,
{
    let mut source = CountingReader::new(source);

    let mut magic = [0u8; 2];
    match source.read_exact(&mut magic) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(CodecError::Format(
                "input is too short to be GZIP data".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    }
    if magic != GZIP_MAGIC {
        return Err(CodecError::Format(format!(
            "not in GZIP format (magic bytes {:02x} {:02x})",
            magic[0], magic[1]
        )));
    }

    let mut decoder = MultiGzDecoder::new(Cursor::new(magic).chain(source));
    let bytes_out = copy_buffered(&mut decoder, dest, CodecError::from_decode)?;
    dest.flush()?;

    let (_, source) = decoder.into_inner().into_inner();
    Ok(StreamStats {
        bytes_in: source.count(),
        bytes_out,
    })
}

/// Compress the file at `source` into a GZIP file at `dest`.
///
/// On success, `original_size` is the number of bytes read and
/// `compressed_size` is the length of the closed destination file. On
/// failure, any destination file this call created is removed.
pub fn compress_file(source: &Path, dest: &Path) -> OperationResult {
    info!("Compressing file: {}", source.display());

    match try_compress_file(source, dest) {
        Ok((original_size, compressed_size)) => {
            let result = OperationResult::success(
                "Compression completed successfully!",
                original_size,
                compressed_size,
            );
            info!(
                original_size,
                compressed_size,
                "Compression completed ({:.2}% saved)",
                result.ratio()
            );
            result
        }
        Err(e) => {
            error!("Error during compression of {}: {}", source.display(), e);
            OperationResult::failure(&e)
        }
    }
}

fn try_compress_file(source: &Path, dest: &Path) -> Result<(u64, u64)> {
    let mut reader = open_source(source)?;
    ensure_distinct(source, dest)?;
    let file = create_dest(dest)?;

    let written = (|| -> Result<_> {
        let mut writer = BufWriter::new(file);
        let stats = compress_stream(&mut reader, &mut writer)?;
        let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        finish_dest(file, dest);
        Ok(stats.bytes_in)
    })();

    match written {
        Ok(original_size) => Ok((original_size, fs::metadata(dest)?.len())),
        Err(e) => {
            remove_failed_output(dest);
            Err(e)
        }
    }
}

/// Decompress the GZIP file at `source` into `dest`.
///
/// The result reports the decompressed length as `original_size` and the
/// compressed input length as `compressed_size`, so the ratio reads the same
/// way as for [`compress_file`]. Malformed input fails with a format error
/// and leaves no destination file behind.
pub fn decompress_file(source: &Path, dest: &Path) -> OperationResult {
    info!("Decompressing file: {}", source.display());

    match try_decompress_file(source, dest) {
        Ok((compressed_size, decompressed_size)) => {
            info!(compressed_size, decompressed_size, "Decompression completed");
            OperationResult::success(
                "Decompression completed successfully!",
                decompressed_size,
                compressed_size,
            )
        }
        Err(e) => {
            error!("Error during decompression of {}: {}", source.display(), e);
            OperationResult::failure(&e)
        }
    }
}

fn try_decompress_file(source: &Path, dest: &Path) -> Result<(u64, u64)> {
    let reader = open_source(source)?;
    ensure_distinct(source, dest)?;
    let file = create_dest(dest)?;

    let written = (|| -> Result<_> {
        let mut writer = BufWriter::new(file);
        decompress_stream(reader, &mut writer)?;
        let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        finish_dest(file, dest);
        Ok(())
    })();

    match written {
        Ok(()) => Ok((fs::metadata(source)?.len(), fs::metadata(dest)?.len())),
        Err(e) => {
            remove_failed_output(dest);
            Err(e)
        }
    }
}
