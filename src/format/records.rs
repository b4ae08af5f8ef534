//! Header record parsing and serialization.
//!
//! [`EntryRecord`] is the in-memory form of one central directory record;
//! it carries everything needed to rewrite both the central header and the
//! matching local header, which is what the rebuild engine relies on when
//! it copies entries raw.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{
    CENTRAL_DIRECTORY_HEADER_SIGNATURE, END_OF_CENTRAL_DIRECTORY_SIGNATURE, FLAG_UTF8,
    LOCAL_FILE_HEADER_SIGNATURE, LOCAL_HEADER_FIXED_LEN,
};
use crate::{Error, Result};

/// One central directory record.
///
/// Offsets and sizes are kept as the raw 32-bit on-disk values; this crate
/// does not write ZIP64 archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EntryRecord {
    pub name: String,
    pub version_made_by: u16,
    pub flags: u16,
    pub method: u16,
    pub dos_time: u16,
    pub dos_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub external_attrs: u32,
    pub header_start: u32,
}

impl EntryRecord {
    /// Parses one central directory record, leaving the reader positioned
    /// at the next record.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != CENTRAL_DIRECTORY_HEADER_SIGNATURE {
            return Err(Error::BadZipFile(format!(
                "bad central directory record signature: {:#010x}",
                signature
            )));
        }
        let version_made_by = reader.read_u16::<LittleEndian>()?;
        let _version_needed = reader.read_u16::<LittleEndian>()?;
        let flags = reader.read_u16::<LittleEndian>()?;
        let method = reader.read_u16::<LittleEndian>()?;
        let dos_time = reader.read_u16::<LittleEndian>()?;
        let dos_date = reader.read_u16::<LittleEndian>()?;
        let crc32 = reader.read_u32::<LittleEndian>()?;
        let compressed_size = reader.read_u32::<LittleEndian>()?;
        let uncompressed_size = reader.read_u32::<LittleEndian>()?;
        let name_len = reader.read_u16::<LittleEndian>()? as usize;
        let extra_len = reader.read_u16::<LittleEndian>()? as usize;
        let comment_len = reader.read_u16::<LittleEndian>()? as usize;
        let _disk_number_start = reader.read_u16::<LittleEndian>()?;
        let _internal_attrs = reader.read_u16::<LittleEndian>()?;
        let external_attrs = reader.read_u32::<LittleEndian>()?;
        let header_start = reader.read_u32::<LittleEndian>()?;

        let mut name_raw = vec![0u8; name_len];
        reader.read_exact(&mut name_raw)?;
        let name = String::from_utf8_lossy(&name_raw).into_owned();

        // Extra fields and per-entry comments are skipped; this crate does
        // not interpret them and never writes them back.
        let mut skip = vec![0u8; extra_len + comment_len];
        reader.read_exact(&mut skip)?;

        Ok(Self {
            name,
            version_made_by,
            flags,
            method,
            dos_time,
            dos_date,
            crc32,
            compressed_size,
            uncompressed_size,
            external_attrs,
            header_start,
        })
    }

    /// Writes this record as a central directory header.
    pub fn write_central<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(CENTRAL_DIRECTORY_HEADER_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.version_made_by)?;
        writer.write_u16::<LittleEndian>(super::VERSION_NEEDED)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.method)?;
        writer.write_u16::<LittleEndian>(self.dos_time)?;
        writer.write_u16::<LittleEndian>(self.dos_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(self.name.len() as u16)?;
        writer.write_u16::<LittleEndian>(0)?; // extra field length
        writer.write_u16::<LittleEndian>(0)?; // comment length
        writer.write_u16::<LittleEndian>(0)?; // disk number start
        writer.write_u16::<LittleEndian>(0)?; // internal attributes
        writer.write_u32::<LittleEndian>(self.external_attrs)?;
        writer.write_u32::<LittleEndian>(self.header_start)?;
        writer.write_all(self.name.as_bytes())?;
        Ok(())
    }

    /// Writes the matching local file header.
    ///
    /// Sizes and CRC reflect the record's current values; a freshly opened
    /// write stream writes zeros here and back-patches them on close via
    /// [`patch_local_sizes`].
    pub fn write_local<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(LOCAL_FILE_HEADER_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(super::VERSION_NEEDED)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.method)?;
        writer.write_u16::<LittleEndian>(self.dos_time)?;
        writer.write_u16::<LittleEndian>(self.dos_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(self.name.len() as u16)?;
        writer.write_u16::<LittleEndian>(0)?; // extra field length
        writer.write_all(self.name.as_bytes())?;
        Ok(())
    }

    /// Size in bytes of the local header [`write_local`][Self::write_local]
    /// produces for this record.
    pub fn local_header_len(&self) -> u64 {
        LOCAL_HEADER_FIXED_LEN + self.name.len() as u64
    }

    /// Returns the general purpose flags appropriate for this record's name.
    pub fn name_flags(name: &str) -> u16 {
        if name.is_ascii() { 0 } else { FLAG_UTF8 }
    }

    /// POSIX permission bits, when the record was produced on Unix.
    pub fn unix_permissions(&self) -> Option<u32> {
        if self.version_made_by >> 8 == super::SYSTEM_UNIX {
            let mode = self.external_attrs >> 16;
            if mode != 0 { Some(mode & 0o7777) } else { None }
        } else {
            None
        }
    }
}

/// Byte offset of the CRC field inside a local file header.
const LOCAL_CRC_OFFSET: u64 = 14;

/// Back-patches CRC-32 and sizes into an already written local header.
///
/// The writer is left positioned just past the patched fields; callers
/// seek explicitly afterwards.
pub(crate) fn patch_local_sizes<W: Write + Seek>(
    writer: &mut W,
    header_start: u64,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
) -> std::io::Result<()> {
    writer.seek(SeekFrom::Start(header_start + LOCAL_CRC_OFFSET))?;
    writer.write_u32::<LittleEndian>(crc32)?;
    writer.write_u32::<LittleEndian>(compressed_size)?;
    writer.write_u32::<LittleEndian>(uncompressed_size)?;
    Ok(())
}

/// Writes a data descriptor record for an entry whose local header was
/// written with the data-descriptor flag set.
///
/// The signature is technically optional per APPNOTE but every modern
/// writer emits it, and strict readers expect it.
pub(crate) fn write_data_descriptor<W: Write>(
    writer: &mut W,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
) -> std::io::Result<()> {
    writer.write_u32::<LittleEndian>(super::DATA_DESCRIPTOR_SIGNATURE)?;
    writer.write_u32::<LittleEndian>(crc32)?;
    writer.write_u32::<LittleEndian>(compressed_size)?;
    writer.write_u32::<LittleEndian>(uncompressed_size)?;
    Ok(())
}

/// Locates the start of an entry's data by parsing its local header.
///
/// The local header's own name/extra lengths can differ from the central
/// record's, so the data offset must be computed from the local copy.
pub(crate) fn local_data_start<R: Read + Seek>(reader: &mut R, header_start: u64) -> Result<u64> {
    reader.seek(SeekFrom::Start(header_start))?;
    let signature = reader.read_u32::<LittleEndian>()?;
    if signature != LOCAL_FILE_HEADER_SIGNATURE {
        return Err(Error::BadZipFile(format!(
            "bad local file header signature at offset {}: {:#010x}",
            header_start, signature
        )));
    }
    reader.seek(SeekFrom::Start(header_start + 26))?;
    let name_len = reader.read_u16::<LittleEndian>()? as u64;
    let extra_len = reader.read_u16::<LittleEndian>()? as u64;
    Ok(header_start + LOCAL_HEADER_FIXED_LEN + name_len + extra_len)
}

/// The end-of-central-directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EndOfCentralDirectory {
    pub entry_count: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    /// An EOCD for an archive with no entries and no comment.
    pub fn empty() -> Self {
        Self {
            entry_count: 0,
            cd_size: 0,
            cd_offset: 0,
            comment: Vec::new(),
        }
    }

    /// Fixed record size, excluding the trailing comment.
    pub const FIXED_LEN: u64 = 22;

    /// Parses an EOCD record at the reader's current position.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != END_OF_CENTRAL_DIRECTORY_SIGNATURE {
            return Err(Error::BadZipFile(format!(
                "bad end-of-central-directory signature: {:#010x}",
                signature
            )));
        }
        let disk_number = reader.read_u16::<LittleEndian>()?;
        let cd_disk = reader.read_u16::<LittleEndian>()?;
        let entries_on_disk = reader.read_u16::<LittleEndian>()?;
        let entry_count = reader.read_u16::<LittleEndian>()?;
        let cd_size = reader.read_u32::<LittleEndian>()?;
        let cd_offset = reader.read_u32::<LittleEndian>()?;
        let comment_len = reader.read_u16::<LittleEndian>()? as usize;

        if disk_number != cd_disk || entries_on_disk != entry_count {
            return Err(Error::BadZipFile(
                "multi-volume archives are not supported".into(),
            ));
        }

        let mut comment = vec![0u8; comment_len];
        reader.read_exact(&mut comment).map_err(|_| Error::ReadComment)?;

        Ok(Self {
            entry_count,
            cd_size,
            cd_offset,
            comment,
        })
    }

    /// Scans backwards from the end of the file for the EOCD record.
    ///
    /// The record is at most `FIXED_LEN + 65535` bytes from the end (the
    /// comment length field is 16-bit). Returns the parsed record and its
    /// byte offset in the file.
    pub fn find_and_parse<R: Read + Seek>(reader: &mut R) -> Result<(Self, u64)> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        if file_len < Self::FIXED_LEN {
            return Err(Error::BadZipFile(
                "file too short to contain an end-of-central-directory record".into(),
            ));
        }

        let search_floor = file_len
            .saturating_sub(Self::FIXED_LEN + u16::MAX as u64);
        let mut pos = file_len - Self::FIXED_LEN;
        loop {
            reader.seek(SeekFrom::Start(pos))?;
            if reader.read_u32::<LittleEndian>()? == END_OF_CENTRAL_DIRECTORY_SIGNATURE {
                // Candidate found; confirm the comment length reaches
                // exactly to the end of the file.
                reader.seek(SeekFrom::Start(pos + 20))?;
                let comment_len = reader.read_u16::<LittleEndian>()? as u64;
                if pos + Self::FIXED_LEN + comment_len == file_len {
                    reader.seek(SeekFrom::Start(pos))?;
                    return Ok((Self::parse(reader)?, pos));
                }
            }
            if pos == search_floor {
                break;
            }
            pos -= 1;
        }
        Err(Error::BadZipFile(
            "end-of-central-directory record not found".into(),
        ))
    }

    /// Writes the record, including the comment.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(END_OF_CENTRAL_DIRECTORY_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(0)?; // disk number
        writer.write_u16::<LittleEndian>(0)?; // disk with central directory
        writer.write_u16::<LittleEndian>(self.entry_count)?;
        writer.write_u16::<LittleEndian>(self.entry_count)?;
        writer.write_u32::<LittleEndian>(self.cd_size)?;
        writer.write_u32::<LittleEndian>(self.cd_offset)?;
        writer.write_u16::<LittleEndian>(self.comment.len() as u16)?;
        writer.write_all(&self.comment)?;
        Ok(())
    }
}
