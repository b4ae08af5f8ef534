//! Archive handle and streaming session state.
//!
//! [`Archive`] binds to a ZIP file on disk and mediates every operation on
//! it. At most one entry stream is open at a time; opening a read stream
//! while a write stream is active (or vice versa) fails with
//! [`Error::MixedModeAccess`] instead of corrupting the file. Metadata
//! operations and whole-entry helpers manage their own streams internally.
//!
//! The central directory index is loaded lazily and cached; any mutation
//! invalidates it so the next lookup re-scans the file.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::debug;

use crate::codec::{self, EntryEncoder};
use crate::crypto::{DecryptingReader, EncryptingWriter};
use crate::format::records::{self, EndOfCentralDirectory, EntryRecord};
use crate::format::{self, FLAG_DATA_DESCRIPTOR, FLAG_ENCRYPTED};
use crate::index::DirectoryIndex;
use crate::metadata::EntryInfo;
use crate::{Error, Result};

/// What the session is currently doing.
///
/// Reported inside [`Error::MixedModeAccess`] when an operation needs the
/// session in a different state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// No entry stream is open.
    Idle,
    /// A read stream is open; only `read_chunk` and `end_stream` are valid.
    Reading,
    /// A write stream is open; only `write_chunk` and `end_stream` are valid.
    Writing,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Idle => write!(f, "idle"),
            SessionMode::Reading => write!(f, "reading an entry"),
            SessionMode::Writing => write!(f, "writing an entry"),
        }
    }
}

/// An open read stream over one entry's decompressed data.
pub(crate) struct ReadStream {
    pub name: String,
    pub decoder: Box<dyn Read + Send>,
    pub hasher: crc32fast::Hasher,
    pub expected_crc: u32,
    pub uncompressed_size: u64,
    pub bytes_out: u64,
}

/// Compressed-byte sink for an open write stream.
///
/// Encryption wraps the file before compression output reaches it, so the
/// two shapes carry different inner writers.
pub(crate) enum WriteSink {
    Plain(EntryEncoder<File>),
    Encrypted(EntryEncoder<EncryptingWriter<File>>),
}

impl WriteSink {
    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            WriteSink::Plain(enc) => enc.write_all(buf),
            WriteSink::Encrypted(enc) => enc.write_all(buf),
        }
    }

    /// Flushes everything and hands the archive file back.
    pub fn finish(self) -> io::Result<File> {
        match self {
            WriteSink::Plain(enc) => enc.finish(),
            WriteSink::Encrypted(enc) => Ok(enc.finish()?.into_inner()),
        }
    }
}

/// An open write stream appending one entry.
///
/// The retained central directory records and archive comment are captured
/// at `begin_write` time; `end_stream` writes them back after the new data.
pub(crate) struct WriteStream {
    pub record: EntryRecord,
    pub sink: WriteSink,
    pub hasher: crc32fast::Hasher,
    pub uncompressed: u64,
    pub data_start: u64,
    pub retained: Vec<EntryRecord>,
    pub comment: Vec<u8>,
}

pub(crate) enum StreamState {
    Idle,
    Reading(ReadStream),
    Writing(WriteStream),
}

impl StreamState {
    fn mode(&self) -> SessionMode {
        match self {
            StreamState::Idle => SessionMode::Idle,
            StreamState::Reading(_) => SessionMode::Reading,
            StreamState::Writing(_) => SessionMode::Writing,
        }
    }
}

/// A handle to a ZIP archive on disk.
///
/// The handle holds no open file descriptor between operations; each
/// operation opens the file, works, and closes it, so an `Archive` can sit
/// in a long-lived struct without pinning the file.
///
/// # Example
///
/// ```rust,no_run
/// use zipkit::{Archive, WriteOptions};
///
/// let mut archive = Archive::create_path("out.zip")?;
/// archive.write_bytes("hello.txt", b"hi there", &WriteOptions::default())?;
/// let data = archive.extract_to_vec("hello.txt")?;
/// assert_eq!(data, b"hi there");
/// # Ok::<(), zipkit::Error>(())
/// ```
pub struct Archive {
    pub(crate) path: PathBuf,
    pub(crate) password: Option<Vec<u8>>,
    pub(crate) index: Option<DirectoryIndex>,
    pub(crate) stream: StreamState,
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("path", &self.path)
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

impl Archive {
    /// Opens an existing archive.
    ///
    /// Fails with [`Error::ArchiveNotFound`] when the file does not exist
    /// and [`Error::BadZipFile`] when it does not look like a ZIP archive.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut archive = Self {
            path,
            password: None,
            index: None,
            stream: StreamState::Idle,
        };
        let mut file = archive.open_file()?;
        format::check_signature(&mut file)?;
        archive.index = Some(DirectoryIndex::load(&mut file)?);
        Ok(archive)
    }

    /// Creates a new empty archive.
    ///
    /// Fails if the file already exists.
    pub fn create_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        EndOfCentralDirectory::empty().write(&mut file)?;
        debug!("created empty archive at {}", path.display());
        Ok(Self {
            path,
            password: None,
            index: None,
            stream: StreamState::Idle,
        })
    }

    /// Sets the password used for encrypted entries, builder-style.
    ///
    /// The password applies to both reading encrypted entries and writing
    /// new ones. ZipCrypto operates on raw bytes; non-ASCII passwords are
    /// used as their UTF-8 encoding.
    pub fn with_password<S: Into<String>>(mut self, password: S) -> Self {
        self.password = Some(password.into().into_bytes());
        self
    }

    /// Sets or clears the password on an existing handle.
    pub fn set_password(&mut self, password: Option<&str>) {
        self.password = password.map(|p| p.as_bytes().to_vec());
    }

    /// The path this handle is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current session mode.
    pub fn mode(&self) -> SessionMode {
        self.stream.mode()
    }

    pub(crate) fn open_file(&self) -> Result<File> {
        match File::open(&self.path) {
            Ok(f) => Ok(f),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::ArchiveNotFound {
                path: self.path.clone(),
            }),
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub(crate) fn open_file_rw(&self) -> Result<File> {
        match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(f) => Ok(f),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::ArchiveNotFound {
                path: self.path.clone(),
            }),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Returns the cached index, scanning the central directory if needed.
    pub(crate) fn index(&mut self) -> Result<&DirectoryIndex> {
        if self.index.is_none() {
            let mut file = self.open_file()?;
            self.index = Some(DirectoryIndex::load(&mut file)?);
        }
        // Populated just above
        match &self.index {
            Some(index) => Ok(index),
            None => Err(Error::Internal("directory index failed to load".into())),
        }
    }

    /// Drops the cached index after a mutation.
    pub(crate) fn invalidate_index(&mut self) {
        self.index = None;
    }

    pub(crate) fn ensure_idle(&self) -> Result<()> {
        match self.stream {
            StreamState::Idle => Ok(()),
            _ => Err(Error::MixedModeAccess {
                mode: self.stream.mode(),
            }),
        }
    }

    /// Lists all entries in central directory order.
    ///
    /// Duplicate names produced by repeated appends are all listed.
    pub fn entries(&mut self) -> Result<Vec<EntryInfo>> {
        Ok(self
            .index()?
            .records()
            .iter()
            .map(EntryInfo::from_record)
            .collect())
    }

    /// Lists entry names in central directory order.
    pub fn entry_names(&mut self) -> Result<Vec<String>> {
        Ok(self
            .index()?
            .records()
            .iter()
            .map(|r| r.name.clone())
            .collect())
    }

    /// Looks up one entry by name.
    ///
    /// When the archive holds several entries with the same name, the last
    /// one wins, matching what extraction tools do.
    pub fn info(&mut self, name: &str) -> Result<EntryInfo> {
        match self.index()?.find(name) {
            Some(record) => Ok(EntryInfo::from_record(record)),
            None => Err(Error::EntryNotFound {
                path: name.to_string(),
            }),
        }
    }

    /// Returns true if an entry with the given name exists.
    pub fn contains(&mut self, name: &str) -> Result<bool> {
        Ok(self.index()?.contains(name))
    }

    /// Number of entries in the archive, duplicates included.
    pub fn len(&mut self) -> Result<usize> {
        Ok(self.index()?.len())
    }

    /// Returns true if the archive holds no entries.
    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.index()?.is_empty())
    }

    /// The archive-level comment, decoded lossily as UTF-8.
    pub fn comment(&mut self) -> Result<String> {
        Ok(String::from_utf8_lossy(self.index()?.comment()).into_owned())
    }

    /// Replaces the archive-level comment in place.
    pub fn set_comment(&mut self, comment: &str) -> Result<()> {
        self.ensure_idle()?;
        if comment.len() > u16::MAX as usize {
            return Err(Error::Parameter(format!(
                "archive comment exceeds {} bytes",
                u16::MAX
            )));
        }
        let mut file = self.open_file_rw()?;
        let (mut eocd, pos) = EndOfCentralDirectory::find_and_parse(&mut file)?;
        eocd.comment = comment.as_bytes().to_vec();
        file.seek(SeekFrom::Start(pos))?;
        eocd.write(&mut file)?;
        file.set_len(pos + EndOfCentralDirectory::FIXED_LEN + eocd.comment.len() as u64)?;
        self.invalidate_index();
        Ok(())
    }

    /// Returns true if any entry in the archive is encrypted.
    pub fn is_password_protected(&mut self) -> Result<bool> {
        Ok(self
            .index()?
            .records()
            .iter()
            .any(|r| r.flags & FLAG_ENCRYPTED != 0))
    }

    /// Checks the configured password against the archive.
    ///
    /// Opens the first encrypted entry and tests its password check byte.
    /// Returns `Ok(true)` when the password fits or when nothing in the
    /// archive is encrypted; `Ok(false)` when it is rejected. The check
    /// byte is an 8-bit filter, so a rare false positive is possible and
    /// is caught later by CRC verification.
    pub fn validate_password(&mut self) -> Result<bool> {
        self.ensure_idle()?;
        let first_encrypted = self
            .index()?
            .records()
            .iter()
            .find(|r| r.flags & FLAG_ENCRYPTED != 0 && !r.name.ends_with('/'))
            .map(|r| r.name.clone());
        let Some(name) = first_encrypted else {
            return Ok(true);
        };
        match self.begin_read(&name) {
            Ok(_) => {
                self.end_stream()?;
                Ok(true)
            }
            Err(Error::InvalidPassword { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Opens a read stream over one entry's content.
    ///
    /// Returns the entry's metadata; the content then comes out of
    /// [`read_chunk`][Self::read_chunk]. The session must be idle.
    pub fn begin_read(&mut self, name: &str) -> Result<EntryInfo> {
        self.ensure_idle()?;
        let record = match self.index()?.find(name) {
            Some(record) => record.clone(),
            None => {
                return Err(Error::EntryNotFound {
                    path: name.to_string(),
                });
            }
        };
        let info = EntryInfo::from_record(&record);

        let mut file = self.open_file()?;
        let data_start = records::local_data_start(&mut file, record.header_start as u64)?;
        file.seek(SeekFrom::Start(data_start))?;
        let limited = file.take(record.compressed_size as u64);

        let encrypted = record.flags & FLAG_ENCRYPTED != 0;
        let source: Box<dyn Read + Send> = if encrypted {
            let password = self.password.as_deref().ok_or_else(|| Error::InvalidPassword {
                path: name.to_string(),
            })?;
            let check_byte = if record.flags & FLAG_DATA_DESCRIPTOR != 0 {
                (record.dos_time >> 8) as u8
            } else {
                (record.crc32 >> 24) as u8
            };
            Box::new(DecryptingReader::new(limited, password, check_byte, name)?)
        } else {
            Box::new(limited)
        };

        let decoder = codec::decode_stream(
            record.method,
            BufReader::new(source),
            record.uncompressed_size as u64,
        )?;

        debug!("begin_read '{}' ({} bytes)", name, record.uncompressed_size);
        self.stream = StreamState::Reading(ReadStream {
            name: name.to_string(),
            decoder,
            hasher: crc32fast::Hasher::new(),
            expected_crc: record.crc32,
            uncompressed_size: record.uncompressed_size as u64,
            bytes_out: 0,
        });
        Ok(info)
    }

    /// Reads the next chunk of decompressed content from the open stream.
    ///
    /// Returns the number of bytes placed in `buf`; `Ok(0)` signals end of
    /// entry, at which point the CRC-32 has been verified and the session
    /// is idle again. A [`Error::CrcMismatch`] at end of stream also
    /// returns the session to idle.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let StreamState::Reading(stream) = &mut self.stream else {
            return Err(Error::MixedModeAccess {
                mode: self.stream.mode(),
            });
        };

        let n = match stream.decoder.read(buf) {
            Ok(n) => n,
            Err(e) => {
                let name = stream.name.clone();
                self.stream = StreamState::Idle;
                return Err(match e.kind() {
                    io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput => {
                        Error::Zlib(e.to_string())
                    }
                    _ => Error::FileRead {
                        path: name,
                        source: e,
                    },
                });
            }
        };

        if n == 0 {
            let actual = std::mem::replace(&mut stream.hasher, crc32fast::Hasher::new()).finalize();
            let expected = stream.expected_crc;
            let name = stream.name.clone();
            let short = stream.bytes_out < stream.uncompressed_size;
            self.stream = StreamState::Idle;
            if short {
                return Err(Error::BadZipFile(format!(
                    "entry '{}' ended before its recorded size",
                    name
                )));
            }
            if actual != expected {
                return Err(Error::CrcMismatch {
                    path: name,
                    expected,
                    actual,
                });
            }
            return Ok(0);
        }

        stream.hasher.update(&buf[..n]);
        stream.bytes_out += n as u64;
        Ok(n)
    }

    /// Closes the open stream, whichever direction it runs.
    ///
    /// Closing a read stream before its end skips CRC verification; the
    /// bytes already returned are not retroactively vouched for. Closing a
    /// write stream finalizes the entry: compressed output is flushed, the
    /// local header back-patched, and the central directory rewritten.
    /// A no-op when the session is already idle.
    pub fn end_stream(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.stream, StreamState::Idle) {
            StreamState::Idle => Ok(()),
            StreamState::Reading(stream) => {
                debug!("read stream on '{}' cancelled", stream.name);
                Ok(())
            }
            StreamState::Writing(stream) => self.finish_write(stream),
        }
    }
}

impl Drop for Archive {
    fn drop(&mut self) {
        // An unfinished write stream would leave the file without a central
        // directory; finishing on drop mirrors what explicit end_stream does.
        if matches!(self.stream, StreamState::Writing(_)) {
            if let Err(e) = self.end_stream() {
                log::warn!(
                    "failed to finalize write stream on drop for {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}
