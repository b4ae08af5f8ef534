//! Error types for ZIP archive operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when working with ZIP archives, along with a convenient
//! [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. You can
//! handle errors using pattern matching or the `?` operator:
//!
//! ```rust,no_run
//! use zipkit::{Archive, Error};
//!
//! fn read_entry(path: &str, name: &str) -> zipkit::Result<Vec<u8>> {
//!     let mut archive = Archive::open_path(path)?;
//!     match archive.extract_to_vec(name) {
//!         Ok(data) => Ok(data),
//!         Err(Error::EntryNotFound { path }) => {
//!             eprintln!("no such entry: {}", path);
//!             Err(Error::EntryNotFound { path })
//!         }
//!         Err(e @ Error::InvalidPassword { .. }) => {
//!             eprintln!("incorrect password");
//!             Err(e)
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```
//!
//! # Categories
//!
//! | Category | Variants | Typical cause |
//! |----------|----------|---------------|
//! | I/O | [`Io`][Error::Io], [`Output`][Error::Output] | File system operations |
//! | Format | [`BadZipFile`][Error::BadZipFile], [`ReadComment`][Error::ReadComment] | Invalid archive data |
//! | Integrity | [`CrcMismatch`][Error::CrcMismatch] | Data corruption |
//! | Security | [`InvalidPassword`][Error::InvalidPassword] | Wrong or missing password |
//! | Session | [`MixedModeAccess`][Error::MixedModeAccess] | Interleaved read/write streams |
//! | Lifecycle | [`FileRead`][Error::FileRead], [`FileWrite`][Error::FileWrite], ... | Entry stream faults |

use std::io;
use std::path::PathBuf;

use crate::archive::SessionMode;

/// Convenient result alias for ZIP archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for ZIP archive operations.
///
/// Each variant carries enough context to diagnose the failure: the entry
/// name involved, the expected vs. actual checksum, or the underlying I/O
/// error. Codec and filesystem faults are translated into this taxonomy at
/// the point they cross into the crate and are never silently swallowed.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred on the archive file itself.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive file does not exist or could not be opened.
    #[error("archive not found: {}", path.display())]
    ArchiveNotFound {
        /// Path the archive handle was bound to.
        path: PathBuf,
    },

    /// The file is not a valid ZIP archive.
    ///
    /// Returned when the signature check fails on open, or when the central
    /// directory is corrupt or truncated.
    #[error("not a valid ZIP archive: {0}")]
    BadZipFile(String),

    /// A parameter was invalid (empty entry name, name too long, etc.).
    #[error("invalid parameter: {0}")]
    Parameter(String),

    /// An internal fault that does not fit any other category.
    #[error("internal error: {0}")]
    Internal(String),

    /// The compression codec failed while reading or writing a stream.
    #[error("compressed data error: {0}")]
    Zlib(String),

    /// The decompressed data's CRC-32 does not match the stored checksum.
    ///
    /// Checked only at normal end-of-stream; a read cancelled early by the
    /// caller is closed without verification.
    #[error("CRC mismatch for entry '{path}': expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        /// Name of the entry that failed verification.
        path: String,
        /// CRC-32 stored in the central directory.
        expected: u32,
        /// CRC-32 computed over the decompressed bytes.
        actual: u32,
    },

    /// No entry with the given name exists in the archive.
    #[error("entry not found in archive: {path}")]
    EntryNotFound {
        /// The name that was looked up.
        path: String,
    },

    /// Writing extracted output to the filesystem failed.
    #[error("output error for '{}': {source}", path.display())]
    Output {
        /// Destination path that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A directory required for extraction collides with an existing plain file.
    #[error("output path exists and is not a directory: {}", path.display())]
    OutputPathIsFile {
        /// The colliding path.
        path: PathBuf,
    },

    /// Decryption of an encrypted entry was rejected.
    ///
    /// Detected from the ZipCrypto password verification byte before any
    /// decompressed bytes are produced, distinct from [`CrcMismatch`][Error::CrcMismatch].
    #[error("wrong password for entry '{path}'")]
    InvalidPassword {
        /// Name of the encrypted entry.
        path: String,
    },

    /// Reading an open entry stream failed.
    #[error("failed to read entry '{path}': {source}")]
    FileRead {
        /// Name of the entry being read.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Opening an entry stream for writing failed.
    #[error("failed to open entry '{path}' for writing: {source}")]
    FileOpenForWrite {
        /// Name of the entry being opened.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Writing to an open entry stream failed.
    #[error("failed to write entry '{path}': {source}")]
    FileWrite {
        /// Name of the entry being written.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Finalizing a write stream (flush, header back-patch) failed.
    #[error("failed to finalize entry '{path}': {source}")]
    FileCloseWriting {
        /// Name of the entry being finalized.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Deleting an entry via archive rebuild failed.
    ///
    /// The original archive is left untouched when this is returned.
    #[error("failed to delete entry '{path}': {reason}")]
    DeleteFile {
        /// Name of the entry being deleted.
        path: String,
        /// Description of the rebuild step that failed.
        reason: String,
    },

    /// A read or write stream was opened while another stream was active.
    ///
    /// The session state is unchanged after this error; close the current
    /// stream with `end_stream` first.
    #[error("operation requires an idle session, but the archive is {mode}")]
    MixedModeAccess {
        /// The mode the session was in when the call was rejected.
        mode: SessionMode,
    },

    /// The archive comment could not be read.
    #[error("failed to read archive comment")]
    ReadComment,

    /// The entry uses a compression method this build cannot decode.
    #[error("unsupported compression method: {method}")]
    UnsupportedMethod {
        /// Raw ZIP method id from the central directory.
        method: u16,
    },
}

impl Error {
    /// Returns the entry name this error refers to, if any.
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            Error::CrcMismatch { path, .. }
            | Error::EntryNotFound { path }
            | Error::InvalidPassword { path }
            | Error::FileRead { path, .. }
            | Error::FileOpenForWrite { path, .. }
            | Error::FileWrite { path, .. }
            | Error::FileCloseWriting { path, .. }
            | Error::DeleteFile { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Returns true if the error indicates corrupt or unreadable archive data.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::BadZipFile(_) | Error::CrcMismatch { .. } | Error::Zlib(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_crc_mismatch() {
        let err = Error::CrcMismatch {
            path: "a.txt".into(),
            expected: 0xDEADBEEF,
            actual: 0x12345678,
        };
        let msg = err.to_string();
        assert!(msg.contains("a.txt"));
        assert!(msg.contains("0xdeadbeef"));
        assert!(msg.contains("0x12345678"));
    }

    #[test]
    fn test_entry_name() {
        let err = Error::EntryNotFound {
            path: "missing.txt".into(),
        };
        assert_eq!(err.entry_name(), Some("missing.txt"));

        let err = Error::ReadComment;
        assert_eq!(err.entry_name(), None);
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_is_corruption() {
        assert!(Error::BadZipFile("truncated".into()).is_corruption());
        assert!(!Error::ReadComment.is_corruption());
    }
}
