use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::{Component, Path};

use flate2::CrcReader;
use flate2::read::DeflateDecoder;
use tracing::{info, warn};

use crate::error::{CodecError, Result};
use crate::io::{copy_buffered, finish_dest};

use super::parser::ZipParser;
use super::structures::{ArchiveEntry, CompressionMethod, ZipFileEntry};

/// ZIP file extractor
pub struct ZipExtractor<R: Read + Seek> {
    parser: ZipParser<R>,
}

impl<R: Read + Seek> ZipExtractor<R> {
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            parser: ZipParser::new(reader)?,
        })
    }

    /// List all entries in the archive
    pub fn list_files(&mut self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files()
    }

    /// Stream one entry's decoded payload into `dest`.
    ///
    /// The decoded length and CRC-32 are checked against the central
    /// directory; a mismatch is a format error.
    pub fn extract_entry<W: Write + ?Sized>(
        &mut self,
        entry: &ZipFileEntry,
        dest: &mut W,
    ) -> Result<u64> {
        let method = entry.compression_method;
        let payload = self.parser.open_payload(entry)?;

        let (written, crc) = match method {
            CompressionMethod::Stored => {
                let mut source = CrcReader::new(payload);
                let n = copy_buffered(&mut source, dest, CodecError::from_decode)?;
                (n, source.crc().sum())
            }
            CompressionMethod::Deflate => {
                let mut source = CrcReader::new(DeflateDecoder::new(payload));
                let n = copy_buffered(&mut source, dest, CodecError::from_decode)?;
                (n, source.crc().sum())
            }
            CompressionMethod::Unknown(m) => {
                return Err(CodecError::Format(format!(
                    "Unsupported compression method {} for {}",
                    m, entry.file_name
                )));
            }
        };

        if written != entry.uncompressed_size {
            return Err(CodecError::Format(format!(
                "{}: expected {} bytes, decoded {}",
                entry.file_name, entry.uncompressed_size, written
            )));
        }
        if crc != entry.crc32 {
            return Err(CodecError::Format(format!(
                "{}: CRC-32 mismatch (expected {:08x}, got {:08x})",
                entry.file_name, entry.crc32, crc
            )));
        }

        Ok(written)
    }

    /// Extract file data to memory
    pub fn extract_to_memory(&mut self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(entry.uncompressed_size.min(1 << 20) as usize);
        self.extract_entry(entry, &mut buf)?;
        Ok(buf)
    }

    /// Read every entry into memory, in archive order.
    pub fn read_entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        let entries = self.list_files()?;
        let mut out = Vec::with_capacity(entries.len());
        for entry in &entries {
            if entry.is_directory {
                out.push(ArchiveEntry::directory(entry.file_name.as_str()));
            } else {
                let payload = self.extract_to_memory(entry)?;
                out.push(ArchiveEntry::file(entry.file_name.as_str(), payload));
            }
        }
        Ok(out)
    }

    /// Extract file to disk
    pub fn extract_to_file(&mut self, entry: &ZipFileEntry, output_path: &Path) -> Result<u64> {
        // Create parent directories if needed
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut writer = BufWriter::new(File::create(output_path)?);
        let written = self.extract_entry(entry, &mut writer)?;
        let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        finish_dest(file, output_path);
        Ok(written)
    }

    /// Extract every entry below `dest_dir`, in archive order.
    ///
    /// Entry names are joined to `dest_dir` as they are; names that climb out
    /// of it are logged but not rewritten. Stops at the first failure and
    /// leaves whatever was already extracted on disk.
    pub fn extract_all(&mut self, dest_dir: &Path) -> Result<usize> {
        fs::create_dir_all(dest_dir)?;

        let entries = self.list_files()?;
        for entry in &entries {
            if escapes_root(&entry.file_name) {
                warn!("Entry name escapes the extraction directory: {}", entry.file_name);
            }

            let output_path = dest_dir.join(&entry.file_name);
            if entry.is_directory {
                fs::create_dir_all(&output_path)?;
                continue;
            }

            self.extract_to_file(entry, &output_path)?;
            info!("Extracted: {}", entry.file_name);
        }

        Ok(entries.len())
    }
}

/// Whether joining `name` to a directory could land outside it.
fn escapes_root(name: &str) -> bool {
    Path::new(name).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::zip::ZipWriter;
    use std::io::Cursor;

    fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Vec::new());
        for (name, data) in entries {
            writer.add_file(name, &mut &data[..]).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn reads_entries_back_in_order() {
        let big: Vec<u8> = (0..50_000u32).map(|i| (i * 31 % 256) as u8).collect();
        let bytes = archive(&[
            ("b.txt", &b"bee"[..]),
            ("a/big.bin", &big[..]),
            ("empty", &b""[..]),
        ]);

        let mut extractor = ZipExtractor::new(Cursor::new(bytes)).unwrap();
        let entries = extractor.read_entries().unwrap();
        assert_eq!(
            entries,
            vec![
                ArchiveEntry::file("b.txt", b"bee".to_vec()),
                ArchiveEntry::directory("a/"),
                ArchiveEntry::file("a/big.bin", big),
                ArchiveEntry::file("empty", Vec::new()),
            ]
        );
    }

    #[test]
    fn duplicate_names_are_kept() {
        let bytes = archive(&[("same.txt", &b"one"[..]), ("same.txt", &b"two"[..])]);
        let mut extractor = ZipExtractor::new(Cursor::new(bytes)).unwrap();
        let entries = extractor.read_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].payload.as_deref(), Some(&b"two"[..]));
    }

    #[test]
    fn corrupted_payload_is_detected() {
        let data = b"a highly repetitive payload ".repeat(40);
        let mut bytes = archive(&[("data.txt", &data[..])]);
        // Flip a byte just after the 30-byte header and 8-byte name.
        bytes[30 + 8 + 4] ^= 0x55;

        let mut extractor = ZipExtractor::new(Cursor::new(bytes)).unwrap();
        let entries = extractor.list_files().unwrap();
        let err = extractor.extract_to_memory(&entries[0]).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Format);
    }

    #[test]
    fn detects_escaping_names() {
        assert!(escapes_root("../evil.txt"));
        assert!(escapes_root("a/../../evil.txt"));
        assert!(escapes_root("/etc/passwd"));
        assert!(!escapes_root("a/b/c.txt"));
    }

    #[test]
    fn extract_all_creates_directories() {
        let bytes = archive(&[("x/y/z.txt", &b"deep"[..]), ("top.txt", &b"top"[..])]);
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out");

        let mut extractor = ZipExtractor::new(Cursor::new(bytes)).unwrap();
        assert_eq!(extractor.extract_all(&out).unwrap(), 4);
        assert_eq!(fs::read(out.join("x/y/z.txt")).unwrap(), b"deep");
        assert_eq!(fs::read(out.join("top.txt")).unwrap(), b"top");
        assert!(out.join("x/y").is_dir());
    }
}
