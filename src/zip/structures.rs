use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{CodecError, Result};

/// Version needed to extract: 2.0 (DEFLATE, directories).
pub const VERSION_NEEDED: u16 = 20;
/// Version made by: UNIX host, APPNOTE 2.0.
pub const VERSION_MADE_BY: u16 = (3 << 8) | VERSION_NEEDED;

/// General purpose flag: sizes and CRC follow the data in a data descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
/// General purpose flag: file name is UTF-8.
pub const FLAG_UTF8: u16 = 0x0800;

/// External attributes for a regular file (`-rw-r--r--`).
pub const FILE_ATTRIBUTES: u32 = 0o100644 << 16;
/// External attributes for a directory (`drwxr-xr-x` plus the MS-DOS bit).
pub const DIR_ATTRIBUTES: u32 = (0o040755 << 16) | 0x10;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(invalid("End of Central Directory"));
        }

        let mut cursor = Cursor::new(&data[4..]);
        let disk_number = cursor.read_u16::<LittleEndian>()?;
        let disk_with_cd = cursor.read_u16::<LittleEndian>()?;
        if disk_number != 0 || disk_with_cd != 0 {
            return Err(CodecError::Format(
                "multi-disk archives are not supported".to_string(),
            ));
        }

        Ok(Self {
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(Self::SIGNATURE)?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_u16::<LittleEndian>(self.disk_entries)?;
        writer.write_u16::<LittleEndian>(self.total_entries)?;
        writer.write_u32::<LittleEndian>(self.cd_size)?;
        writer.write_u32::<LittleEndian>(self.cd_offset)?;
        writer.write_u16::<LittleEndian>(self.comment_len)?;
        Ok(())
    }

    /// Any field saturated to its marker value means a ZIP64 record is needed.
    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// Local File Header (LFH) - 30 bytes before the name
pub struct LocalFileHeader<'a> {
    pub flags: u16,
    pub method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name: &'a str,
}

impl LocalFileHeader<'_> {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: usize = 30;

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(Self::SIGNATURE)?;
        writer.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.method.as_u16())?;
        writer.write_u16::<LittleEndian>(self.last_mod_time)?;
        writer.write_u16::<LittleEndian>(self.last_mod_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(name_len(self.file_name)?)?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_all(self.file_name.as_bytes())?;
        Ok(())
    }

    /// Read the fixed part of a local header and return the number of bytes
    /// between the header start and the entry payload.
    pub fn read_payload_offset<R: Read>(reader: &mut R) -> Result<u64> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact(&mut buf)?;
        if &buf[0..4] != Self::SIGNATURE {
            return Err(invalid("Local File Header"));
        }

        let mut cursor = Cursor::new(&buf[26..]);
        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;
        Ok(Self::SIZE as u64 + file_name_length + extra_field_length)
    }
}

/// Data descriptor written after a streamed entry's payload.
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl DataDescriptor {
    pub const SIGNATURE: &'static [u8] = b"PK\x07\x08";

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(Self::SIGNATURE)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        Ok(())
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";

/// Parsed ZIP file entry information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl ZipFileEntry {
    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// Write this entry as a central directory record.
    pub fn write_central<W: Write>(&self, writer: &mut W) -> Result<()> {
        let external_attrs = if self.is_directory {
            DIR_ATTRIBUTES
        } else {
            FILE_ATTRIBUTES
        };

        writer.write_all(CDFH_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
        writer.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        writer.write_u16::<LittleEndian>(self.last_mod_time)?;
        writer.write_u16::<LittleEndian>(self.last_mod_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(to_u32(self.compressed_size, "entry size")?)?;
        writer.write_u32::<LittleEndian>(to_u32(self.uncompressed_size, "entry size")?)?;
        writer.write_u16::<LittleEndian>(name_len(&self.file_name)?)?;
        writer.write_u16::<LittleEndian>(0)?; // extra field
        writer.write_u16::<LittleEndian>(0)?; // comment
        writer.write_u16::<LittleEndian>(0)?; // disk number start
        writer.write_u16::<LittleEndian>(0)?; // internal attributes
        writer.write_u32::<LittleEndian>(external_attrs)?;
        writer.write_u32::<LittleEndian>(to_u32(self.lfh_offset, "archive offset")?)?;
        writer.write_all(self.file_name.as_bytes())?;
        Ok(())
    }
}

/// Logical archive entry held in memory.
///
/// Archives are ordered sequences: names may repeat, so consumers should
/// keep entries in a `Vec` rather than a map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Relative path inside the archive, `/`-separated.
    pub name: String,
    pub is_directory: bool,
    /// Entry contents; `None` for directories.
    pub payload: Option<Vec<u8>>,
}

impl ArchiveEntry {
    pub fn file(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            payload: Some(payload.into()),
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
            payload: None,
        }
    }
}

/// Narrow a size or offset to the 32-bit field of a non-ZIP64 archive.
pub fn to_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| CodecError::Format(format!("{what} exceeds the 4 GiB ZIP limit")))
}

fn name_len(name: &str) -> Result<u16> {
    u16::try_from(name.len())
        .map_err(|_| CodecError::Format(format!("entry name too long: {} bytes", name.len())))
}

fn invalid(record: &str) -> CodecError {
    CodecError::Format(format!("Invalid {record}"))
}

/// Convert a timestamp to MS-DOS `(time, date)` fields in UTC.
///
/// Times before 1980 clamp to 1980-01-01 00:00:00, the earliest DOS date.
pub fn dos_datetime(at: SystemTime) -> (u16, u16) {
    const DOS_EPOCH: u64 = 315_532_800; // 1980-01-01T00:00:00Z

    let secs = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
        .max(DOS_EPOCH);

    let days = (secs / 86_400) as i64;
    let time_of_day = secs % 86_400;

    // Civil date from days since 1970-01-01 (proleptic Gregorian).
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);

    let year = (year - 1980).clamp(0, 127) as u16;
    let date = (year << 9) | ((month as u16) << 5) | day as u16;

    let hour = (time_of_day / 3600) as u16;
    let minute = ((time_of_day % 3600) / 60) as u16;
    let second = ((time_of_day % 60) / 2) as u16;
    let time = (hour << 11) | (minute << 5) | second;

    (time, date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn dos_datetime_known_instant() {
        // 2024-02-29T13:45:58Z
        let at = UNIX_EPOCH + Duration::from_secs(1_709_214_358);
        let (time, date) = dos_datetime(at);

        let entry = ZipFileEntry {
            file_name: "x".into(),
            flags: 0,
            compression_method: CompressionMethod::Stored,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset: 0,
            last_mod_time: time,
            last_mod_date: date,
            is_directory: false,
        };
        assert_eq!(entry.mod_date(), (2024, 2, 29));
        assert_eq!(entry.mod_time(), (13, 45, 58));
    }

    #[test]
    fn dos_datetime_clamps_before_1980() {
        assert_eq!(dos_datetime(UNIX_EPOCH), (0, (1 << 5) | 1));
    }

    #[test]
    fn eocd_write_then_parse() {
        let eocd = EndOfCentralDirectory {
            disk_entries: 3,
            total_entries: 3,
            cd_size: 150,
            cd_offset: 4096,
            comment_len: 0,
        };
        let mut buf = Vec::new();
        eocd.write(&mut buf).unwrap();
        assert_eq!(buf.len(), EndOfCentralDirectory::SIZE);
        assert_eq!(EndOfCentralDirectory::from_bytes(&buf).unwrap(), eocd);
        assert!(!eocd.is_zip64());
    }

    #[test]
    fn oversized_values_are_rejected() {
        assert!(to_u32(u64::from(u32::MAX), "size").is_ok());
        assert!(to_u32(u64::from(u32::MAX) + 1, "size").is_err());
    }
}
