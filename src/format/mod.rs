//! ZIP container layout: signatures, header records, and directory scans.
//!
//! This module owns the byte-level view of an archive: local file headers,
//! central directory records, and the end-of-central-directory (EOCD)
//! record, all little-endian per the PKWARE APPNOTE layout. Compression
//! itself lives in [`crate::codec`]; everything here is plain structure.

pub(crate) mod records;

use std::io::{Read, Seek, SeekFrom};

use crate::{Error, Result};

/// Local file header signature, `PK\x03\x04`.
pub(crate) const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
/// Central directory file header signature, `PK\x01\x02`.
pub(crate) const CENTRAL_DIRECTORY_HEADER_SIGNATURE: u32 = 0x02014b50;
/// End of central directory signature, `PK\x05\x06`.
pub(crate) const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054b50;
/// Data descriptor signature, `PK\x07\x08`.
pub(crate) const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;

/// General purpose flag bit 0: entry data is encrypted.
pub(crate) const FLAG_ENCRYPTED: u16 = 1 << 0;
/// General purpose flag bit 3: sizes follow the data in a descriptor.
pub(crate) const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// General purpose flag bit 11: name and comment are UTF-8.
pub(crate) const FLAG_UTF8: u16 = 1 << 11;

/// ZIP compression method id for stored (uncompressed) data.
pub(crate) const ZIP_METHOD_STORED: u16 = 0;
/// ZIP compression method id for Deflate.
pub(crate) const ZIP_METHOD_DEFLATED: u16 = 8;

/// Version-made-by host id for Unix, in the high byte.
pub(crate) const SYSTEM_UNIX: u16 = 3;
/// PKWARE "version needed to extract" written by this crate
/// (2.0: deflate + directories).
pub(crate) const VERSION_NEEDED: u16 = 20;

/// Size of the fixed portion of a local file header.
pub(crate) const LOCAL_HEADER_FIXED_LEN: u64 = 30;
/// Size of the ZipCrypto per-entry encryption header.
pub(crate) const CRYPTO_HEADER_LEN: u64 = 12;

/// Checks the leading four bytes of an archive file.
///
/// Accepts the local-file-header magic (archives with at least one entry)
/// and the EOCD magic (empty archives). The reader is left at the start.
pub(crate) fn check_signature<R: Read + Seek>(reader: &mut R) -> Result<()> {
    reader.seek(SeekFrom::Start(0))?;
    let mut magic = [0u8; 4];
    match reader.read_exact(&mut magic) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(Error::BadZipFile("file too short for a ZIP signature".into()));
        }
        Err(e) => return Err(Error::Io(e)),
    }
    reader.seek(SeekFrom::Start(0))?;
    let value = u32::from_le_bytes(magic);
    if value == LOCAL_FILE_HEADER_SIGNATURE || value == END_OF_CENTRAL_DIRECTORY_SIGNATURE {
        Ok(())
    } else {
        Err(Error::BadZipFile(format!(
            "signature mismatch: expected PK\\x03\\x04 or PK\\x05\\x06, found {:#010x}",
            value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_check_signature_local_header() {
        let mut cursor = Cursor::new(vec![0x50, 0x4B, 0x03, 0x04, 0, 0, 0, 0]);
        assert!(check_signature(&mut cursor).is_ok());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_check_signature_empty_archive() {
        let mut cursor = Cursor::new(vec![0x50, 0x4B, 0x05, 0x06, 0, 0, 0, 0]);
        assert!(check_signature(&mut cursor).is_ok());
    }

    #[test]
    fn test_check_signature_rejects_garbage() {
        let mut cursor = Cursor::new(vec![0xDE, 0xAD, 0xBE, 0xEF, 0, 0]);
        assert!(matches!(
            check_signature(&mut cursor),
            Err(Error::BadZipFile(_))
        ));
    }

    #[test]
    fn test_check_signature_short_file() {
        let mut cursor = Cursor::new(vec![0x50, 0x4B]);
        assert!(matches!(
            check_signature(&mut cursor),
            Err(Error::BadZipFile(_))
        ));
    }
}
