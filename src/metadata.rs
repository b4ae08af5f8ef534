//! Entry metadata model.
//!
//! [`EntryInfo`] is the immutable descriptor for one archive member,
//! produced by the directory index when it scans the central directory.
//! A changed entry is always represented by a fresh snapshot after the
//! index is rebuilt; instances are never mutated in place.

use std::time::SystemTime;

use crate::Timestamp;
use crate::format::records::EntryRecord;
use crate::format::{self, ZIP_METHOD_DEFLATED, ZIP_METHOD_STORED};

/// Compression applied when writing an entry.
///
/// ZIP stores only the method id, not the effort level, so entries read
/// back from an archive report [`None`][CompressionLevel::None] for stored
/// data and [`Default`][CompressionLevel::Default] for anything deflated.
///
/// # Example
///
/// ```rust
/// use zipkit::CompressionLevel;
///
/// assert_eq!(CompressionLevel::default(), CompressionLevel::Default);
/// assert_eq!(CompressionLevel::Best.method_id(), 8);
/// assert_eq!(CompressionLevel::None.method_id(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionLevel {
    /// Store the bytes uncompressed.
    None,
    /// Deflate at the fastest setting (level 1).
    Fastest,
    /// Deflate at the default setting (level 6).
    #[default]
    Default,
    /// Deflate at the best (slowest) setting (level 9).
    Best,
}

impl CompressionLevel {
    /// Returns the ZIP method id this level writes (0 = stored, 8 = deflated).
    pub fn method_id(&self) -> u16 {
        match self {
            CompressionLevel::None => ZIP_METHOD_STORED,
            _ => ZIP_METHOD_DEFLATED,
        }
    }

    /// Returns the zlib effort level for deflated variants.
    pub(crate) fn deflate_level(&self) -> u32 {
        match self {
            CompressionLevel::None => 0,
            CompressionLevel::Fastest => 1,
            CompressionLevel::Default => 6,
            CompressionLevel::Best => 9,
        }
    }

    /// Maps a raw ZIP method id back to a level for display purposes.
    pub(crate) fn from_method_id(method: u16) -> Self {
        if method == ZIP_METHOD_STORED {
            CompressionLevel::None
        } else {
            CompressionLevel::Default
        }
    }
}

/// Immutable metadata snapshot for one archive entry.
///
/// Obtained from [`Archive::entries`][crate::Archive::entries] or
/// [`Archive::info`][crate::Archive::info]. Names are posix-style
/// `/`-separated relative paths; directory entries end in `/`.
///
/// # Example
///
/// ```rust,no_run
/// use zipkit::Archive;
///
/// let mut archive = Archive::open_path("data.zip")?;
/// for info in archive.entries()? {
///     println!(
///         "{}: {} -> {} bytes{}",
///         info.name(),
///         info.compressed_size(),
///         info.uncompressed_size(),
///         if info.is_encrypted() { " (encrypted)" } else { "" },
///     );
/// }
/// # Ok::<(), zipkit::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    name: String,
    timestamp: Timestamp,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    method: CompressionLevel,
    is_directory: bool,
    is_encrypted: bool,
    permissions: Option<u32>,
}

impl EntryInfo {
    pub(crate) fn from_record(record: &EntryRecord) -> Self {
        Self {
            name: record.name.clone(),
            timestamp: Timestamp::from_dos(record.dos_date, record.dos_time),
            crc32: record.crc32,
            compressed_size: record.compressed_size as u64,
            uncompressed_size: record.uncompressed_size as u64,
            method: CompressionLevel::from_method_id(record.method),
            is_directory: record.name.ends_with('/'),
            is_encrypted: record.flags & format::FLAG_ENCRYPTED != 0,
            permissions: record.unix_permissions(),
        }
    }

    /// The entry name: a posix-style relative path inside the archive.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last-modified timestamp, at MS-DOS 2-second precision.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Last-modified time as a [`SystemTime`].
    pub fn modified(&self) -> SystemTime {
        self.timestamp.to_system_time()
    }

    /// CRC-32 of the uncompressed content.
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Size of the entry's stored (compressed) data in bytes.
    ///
    /// For encrypted entries this includes the 12-byte encryption header.
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// Size of the entry's content after decompression.
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    /// Compression method recorded for the entry.
    pub fn method(&self) -> CompressionLevel {
        self.method
    }

    /// Returns true if the entry is a directory (name ends in `/`).
    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Returns true if the entry's data is password-protected.
    pub fn is_encrypted(&self) -> bool {
        self.is_encrypted
    }

    /// POSIX permission bits, when the producing tool recorded them.
    pub fn permissions(&self) -> Option<u32> {
        self.permissions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(name: &str) -> EntryRecord {
        EntryRecord {
            name: name.to_string(),
            version_made_by: (3 << 8) | 20, // Unix
            flags: 0,
            method: ZIP_METHOD_DEFLATED,
            dos_time: 0xA5A3,
            dos_date: 0x4D0F,
            crc32: 0xCAFEBABE,
            compressed_size: 100,
            uncompressed_size: 250,
            external_attrs: 0o644 << 16,
            header_start: 0,
        }
    }

    #[test]
    fn test_from_record() {
        let info = EntryInfo::from_record(&sample_record("docs/readme.txt"));
        assert_eq!(info.name(), "docs/readme.txt");
        assert_eq!(info.crc32(), 0xCAFEBABE);
        assert_eq!(info.compressed_size(), 100);
        assert_eq!(info.uncompressed_size(), 250);
        assert_eq!(info.method(), CompressionLevel::Default);
        assert_eq!(info.timestamp().year(), 2018);
        assert!(!info.is_directory());
        assert!(!info.is_encrypted());
        assert_eq!(info.permissions(), Some(0o644));
    }

    #[test]
    fn test_directory_flag() {
        let info = EntryInfo::from_record(&sample_record("docs/"));
        assert!(info.is_directory());
    }

    #[test]
    fn test_encrypted_flag() {
        let mut record = sample_record("secret.bin");
        record.flags |= format::FLAG_ENCRYPTED;
        let info = EntryInfo::from_record(&record);
        assert!(info.is_encrypted());
    }

    #[test]
    fn test_level_method_ids() {
        assert_eq!(CompressionLevel::None.method_id(), ZIP_METHOD_STORED);
        assert_eq!(CompressionLevel::Fastest.method_id(), ZIP_METHOD_DEFLATED);
        assert_eq!(CompressionLevel::Default.method_id(), ZIP_METHOD_DEFLATED);
        assert_eq!(CompressionLevel::Best.method_id(), ZIP_METHOD_DEFLATED);
        assert_eq!(CompressionLevel::Fastest.deflate_level(), 1);
        assert_eq!(CompressionLevel::Best.deflate_level(), 9);
    }
}
