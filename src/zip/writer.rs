//! Streaming ZIP archive builder.
//!
//! Entries are written in a single forward pass, so the destination only
//! needs [`Write`]. Each file's CRC-32 and sizes are unknown until its payload
//! has been streamed, so they follow the payload in a data descriptor and are
//! repeated in the central directory.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::time::SystemTime;

use flate2::write::DeflateEncoder;
use flate2::{Compression, CrcReader};
use tracing::debug;

use crate::error::{CodecError, Result};
use crate::io::{CountingWriter, copy_buffered};

use super::structures::*;

/// ZIP archive writer.
pub struct ZipWriter<W: Write> {
    writer: CountingWriter<W>,
    entries: Vec<ZipFileEntry>,
    directories: HashSet<String>,
    last_mod_time: u16,
    last_mod_date: u16,
}

impl<W: Write> ZipWriter<W> {
    /// Start a new archive; every entry is stamped with the current time.
    pub fn new(writer: W) -> Self {
        let (last_mod_time, last_mod_date) = dos_datetime(SystemTime::now());
        Self {
            writer: CountingWriter::new(writer),
            entries: Vec::new(),
            directories: HashSet::new(),
            last_mod_time,
            last_mod_date,
        }
    }

    /// Names of the entries written so far, in archive order.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.file_name.as_str())
    }

    /// Add a directory entry. A trailing `/` is appended when missing.
    ///
    /// Each directory is written once; repeated calls are no-ops.
    pub fn add_directory(&mut self, name: &str) -> Result<()> {
        let mut name = normalize_name(name);
        if !name.ends_with('/') {
            name.push('/');
        }
        self.write_directory(name)
    }

    /// Stream `source` into a DEFLATE entry called `name`.
    ///
    /// Directory entries for every parent implied by `name` are written
    /// first. Returns the number of uncompressed bytes read.
    pub fn add_file<R: Read + ?Sized>(&mut self, name: &str, source: &mut R) -> Result<u64> {
        let name = file_entry_name(name)?;
        self.write_parents(&name)?;

        let lfh_offset = self.writer.count();
        let flags = FLAG_DATA_DESCRIPTOR | FLAG_UTF8;
        LocalFileHeader {
            flags,
            method: CompressionMethod::Deflate,
            last_mod_time: self.last_mod_time,
            last_mod_date: self.last_mod_date,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name: &name,
        }
        .write(&mut self.writer)?;

        let data_start = self.writer.count();
        let mut source = CrcReader::new(source);
        let mut encoder = DeflateEncoder::new(&mut self.writer, Compression::default());
        let uncompressed_size = copy_buffered(&mut source, &mut encoder, CodecError::Io)?;
        encoder.finish()?;
        let compressed_size = self.writer.count() - data_start;
        let crc32 = source.crc().sum();

        DataDescriptor {
            crc32,
            compressed_size: to_u32(compressed_size, "entry size")?,
            uncompressed_size: to_u32(uncompressed_size, "entry size")?,
        }
        .write(&mut self.writer)?;

        debug!(
            entry = %name,
            uncompressed_size,
            compressed_size,
            "wrote archive entry"
        );

        self.entries.push(ZipFileEntry {
            file_name: name,
            flags,
            compression_method: CompressionMethod::Deflate,
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
            last_mod_time: self.last_mod_time,
            last_mod_date: self.last_mod_date,
            is_directory: false,
        });

        Ok(uncompressed_size)
    }

    /// Add an in-memory entry.
    pub fn add_entry(&mut self, entry: &ArchiveEntry) -> Result<()> {
        if entry.is_directory {
            return self.add_directory(&entry.name);
        }
        let payload = entry.payload.as_deref().unwrap_or_default();
        self.add_file(&entry.name, &mut &payload[..])?;
        Ok(())
    }

    /// Write the central directory and end record, returning the destination.
    pub fn finish(mut self) -> Result<W> {
        let total_entries = u16::try_from(self.entries.len())
            .ok()
            .filter(|&n| n != 0xFFFF)
            .ok_or_else(|| {
                CodecError::Format(format!(
                    "too many entries for a ZIP archive: {}",
                    self.entries.len()
                ))
            })?;

        let cd_offset = self.writer.count();
        for entry in &self.entries {
            entry.write_central(&mut self.writer)?;
        }
        let cd_size = self.writer.count() - cd_offset;

        EndOfCentralDirectory {
            disk_entries: total_entries,
            total_entries,
            cd_size: to_u32(cd_size, "central directory size")?,
            cd_offset: to_u32(cd_offset, "archive offset")?,
            comment_len: 0,
        }
        .write(&mut self.writer)?;

        self.writer.flush()?;
        Ok(self.writer.into_inner())
    }

    fn write_parents(&mut self, name: &str) -> Result<()> {
        for (i, _) in name.match_indices('/') {
            self.write_directory(name[..=i].to_string())?;
        }
        Ok(())
    }

    fn write_directory(&mut self, name: String) -> Result<()> {
        if name == "/" || self.directories.contains(&name) {
            return Ok(());
        }
        self.write_parents(&name[..name.len() - 1])?;

        let lfh_offset = self.writer.count();
        LocalFileHeader {
            flags: FLAG_UTF8,
            method: CompressionMethod::Stored,
            last_mod_time: self.last_mod_time,
            last_mod_date: self.last_mod_date,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name: &name,
        }
        .write(&mut self.writer)?;

        debug!(entry = %name, "wrote directory entry");
        self.directories.insert(name.clone());
        self.entries.push(ZipFileEntry {
            file_name: name,
            flags: FLAG_UTF8,
            compression_method: CompressionMethod::Stored,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset,
            last_mod_time: self.last_mod_time,
            last_mod_date: self.last_mod_date,
            is_directory: true,
        });
        Ok(())
    }
}

/// Normalize `name` for a file entry, rejecting names no file entry can carry.
///
/// Nothing is written for a rejected name, so callers can skip it and keep
/// building the archive.
pub fn file_entry_name(name: &str) -> Result<String> {
    let name = normalize_name(name);
    if name.is_empty() || name.ends_with('/') {
        return Err(CodecError::Format(format!("invalid file entry name: {name:?}")));
    }
    if name.len() > usize::from(u16::MAX) {
        return Err(CodecError::Format(format!(
            "entry name too long: {} bytes",
            name.len()
        )));
    }
    Ok(name)
}

/// Archive names always use `/` and never start with one.
fn normalize_name(name: &str) -> String {
    name.replace('\\', "/").trim_start_matches('/').to_string()
}
