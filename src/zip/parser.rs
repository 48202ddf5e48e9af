//! Reads archive metadata from any seekable source.
//!
//! Lookup runs back to front: locate the end record, load the whole
//! central directory, then visit an entry's local header only when its
//! payload is needed. Sizes always come from the central directory since
//! streamed entries leave them zeroed in the local header.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::error::{CodecError, Result};

use super::structures::*;

/// An archive comment is at most `u16::MAX` bytes, which bounds the tail
/// scanned for the end record.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Central directory reader behind [`ZipExtractor`](super::ZipExtractor).
pub struct ZipParser<R: Read + Seek> {
    reader: R,
    size: u64,
}

impl<R: Read + Seek> ZipParser<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let size = reader.seek(SeekFrom::End(0))?;
        Ok(Self { reader, size })
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.reader.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                CodecError::Format("archive is truncated".to_string())
            } else {
                e.into()
            }
        })
    }

    /// Locate the end record and return it with its absolute offset.
    ///
    /// Checks the last 22 bytes first, then scans backwards through the
    /// comment window for a signature whose comment length reaches exactly
    /// to the end of the file. Fails with [`CodecError::Format`] otherwise.
    pub fn find_eocd(&mut self) -> Result<(EndOfCentralDirectory, u64)> {
        if self.size < EndOfCentralDirectory::SIZE as u64 {
            return Err(CodecError::Format("Not a valid ZIP file".to_string()));
        }

        // Common case: no archive comment.
        let offset = self.size - EndOfCentralDirectory::SIZE as u64;
        let mut buf = [0u8; EndOfCentralDirectory::SIZE];
        self.read_at(offset, &mut buf)?;
        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && buf[20..22] == [0, 0] {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            return Ok((eocd, offset));
        }

        // Archive has a trailing comment.
        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.read_at(search_start, &mut buf)?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // The comment length must account for every remaining byte.
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        Err(CodecError::Format("Not a valid ZIP file".to_string()))
    }

    /// List all entries in the ZIP archive, in central directory order.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Format`] if the archive is invalid or needs
    /// ZIP64 support.
    pub fn list_files(&mut self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, eocd_offset) = self.find_eocd()?;
        if eocd.is_zip64() {
            return Err(CodecError::Format(
                "ZIP64 archives are not supported".to_string(),
            ));
        }

        let cd_offset = eocd.cd_offset as u64;
        let cd_size = eocd.cd_size as u64;
        if cd_offset + cd_size > eocd_offset {
            return Err(CodecError::Format(
                "central directory lies outside the archive".to_string(),
            ));
        }

        // Read the entire Central Directory at once.
        let mut cd_data = vec![0u8; cd_size as usize];
        self.read_at(cd_offset, &mut cd_data)?;

        let mut entries = Vec::with_capacity(eocd.total_entries as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());

        for _ in 0..eocd.total_entries {
            let entry = parse_cdfh(&mut cursor).map_err(|e| match e {
                CodecError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                    CodecError::Format("central directory is truncated".to_string())
                }
                other => other,
            })?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Get the actual payload offset for an entry.
    ///
    /// The Local File Header has variable-length fields (file name, extra
    /// field) that may differ from the Central Directory entry, so it has to
    /// be read to find where the payload begins.
    pub fn get_data_offset(&mut self, entry: &ZipFileEntry) -> Result<u64> {
        self.reader.seek(SeekFrom::Start(entry.lfh_offset))?;
        let header_len = LocalFileHeader::read_payload_offset(&mut self.reader)?;
        let data_offset = entry.lfh_offset + header_len;

        if data_offset + entry.compressed_size > self.size {
            return Err(CodecError::Format(format!(
                "entry {} extends past the end of the archive",
                entry.file_name
            )));
        }
        Ok(data_offset)
    }

    /// Position the reader at an entry's payload and return it, limited to
    /// the entry's compressed size.
    pub fn open_payload(&mut self, entry: &ZipFileEntry) -> Result<std::io::Take<&mut R>> {
        let offset = self.get_data_offset(entry)?;
        self.reader.seek(SeekFrom::Start(offset))?;
        Ok((&mut self.reader).take(entry.compressed_size))
    }
}

/// Decode one central directory record, leaving the cursor on the next.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        return Err(CodecError::Format(
            "Invalid Central Directory File Header".to_string(),
        ));
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let compressed_size = cursor.read_u32::<LittleEndian>()?;
    let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let lfh_offset = cursor.read_u32::<LittleEndian>()?;

    if compressed_size == u32::MAX || uncompressed_size == u32::MAX || lfh_offset == u32::MAX {
        return Err(CodecError::Format(
            "ZIP64 entries are not supported".to_string(),
        ));
    }

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    // Lossy conversion keeps non-UTF8 names readable
    let file_name = String::from_utf8_lossy(&file_name_bytes).into_owned();

    let is_directory = file_name.ends_with('/');

    // Skip the extra field and comment; neither is used
    let skip = extra_field_length as u64 + file_comment_length as u64;
    let next = cursor.position() + skip;
    if next > cursor.get_ref().len() as u64 {
        return Err(CodecError::Format(
            "central directory is truncated".to_string(),
        ));
    }
    cursor.set_position(next);

    Ok(ZipFileEntry {
        file_name,
        flags,
        compression_method: CompressionMethod::from_u16(compression_method),
        compressed_size: compressed_size as u64,
        uncompressed_size: uncompressed_size as u64,
        crc32,
        lfh_offset: lfh_offset as u64,
        last_mod_time,
        last_mod_date,
        is_directory,
    })
}
