//! Writing entries into an archive.
//!
//! New entries are appended where the central directory used to start; the
//! directory and end record are rewritten after the new data. Overwriting
//! an existing name first rebuilds the archive without it, so the replaced
//! bytes do not linger in the file.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;

use crate::archive::{Archive, StreamState, WriteSink, WriteStream};
use crate::codec::EntryEncoder;
use crate::crypto::EncryptingWriter;
use crate::format::records::{self, EndOfCentralDirectory, EntryRecord};
use crate::format::{FLAG_DATA_DESCRIPTOR, FLAG_ENCRYPTED, SYSTEM_UNIX};
use crate::metadata::CompressionLevel;
use crate::timestamp::Timestamp;
use crate::{Error, READ_BUFFER_SIZE, Result};

/// MS-DOS directory attribute bit, kept in the low byte of external
/// attributes for tools that only look there.
const DOS_ATTR_DIRECTORY: u32 = 0x10;

/// Options for writing one entry.
///
/// The defaults deflate at the standard level, append even when an entry
/// of the same name exists, and stamp the entry with the current time.
///
/// # Example
///
/// ```rust,no_run
/// use zipkit::{Archive, CompressionLevel, WriteOptions};
///
/// let mut archive = Archive::create_path("out.zip")?;
/// let options = WriteOptions::new()
///     .level(CompressionLevel::Best)
///     .permissions(0o600)
///     .overwrite(true);
/// archive.write_bytes("notes/today.txt", b"...", &options)?;
/// # Ok::<(), zipkit::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    level: CompressionLevel,
    overwrite: bool,
    modified: Option<Timestamp>,
    permissions: Option<u32>,
    password: Option<Vec<u8>>,
    size_hint: Option<u64>,
}

impl WriteOptions {
    /// Creates options with the defaults described above.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compression level for the entry data.
    pub fn level(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    /// Whether an existing entry of the same name is replaced, which
    /// rebuilds the archive. By default a duplicate record is appended
    /// after it and lookups resolve to the later one.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Last-modified timestamp to record; defaults to the current time.
    pub fn modified(mut self, modified: Timestamp) -> Self {
        self.modified = Some(modified);
        self
    }

    /// POSIX permission bits to record; defaults to `0o644` for files and
    /// `0o755` for directories.
    pub fn permissions(mut self, mode: u32) -> Self {
        self.permissions = Some(mode & 0o7777);
        self
    }

    /// Password for this entry, overriding the archive-level password.
    pub fn password<S: Into<String>>(mut self, password: S) -> Self {
        self.password = Some(password.into().into_bytes());
        self
    }

    /// Expected total size of a streamed entry.
    ///
    /// Only used by [`Archive::write_stream_with_progress`] to turn bytes
    /// submitted into a percentage; without it streamed progress reports 0.
    pub fn size_hint(mut self, bytes: u64) -> Self {
        self.size_hint = Some(bytes);
        self
    }
}

fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Parameter("entry name is empty".into()));
    }
    if name.len() > u16::MAX as usize {
        return Err(Error::Parameter(format!(
            "entry name exceeds {} bytes",
            u16::MAX
        )));
    }
    if name.starts_with('/') {
        return Err(Error::Parameter(format!(
            "entry name must be relative: '{}'",
            name
        )));
    }
    if name.contains('\0') {
        return Err(Error::Parameter("entry name contains a NUL byte".into()));
    }
    Ok(())
}

impl Archive {
    /// Opens a write stream for a new entry.
    ///
    /// Content then goes in through [`write_chunk`][Self::write_chunk] and
    /// the entry is finalized by [`end_stream`][Self::end_stream]. The
    /// session must be idle.
    ///
    /// When the entry is encrypted, a streamed write cannot know the CRC-32
    /// up front, so the password check byte is derived from the timestamp
    /// and the data-descriptor flag is set, as streaming ZIP writers do;
    /// a descriptor record is appended after the data for readers that
    /// honor the flag.
    pub fn begin_write(&mut self, name: &str, options: &WriteOptions) -> Result<()> {
        self.begin_write_inner(name, options, None)
    }

    pub(crate) fn begin_write_inner(
        &mut self,
        name: &str,
        options: &WriteOptions,
        known_crc: Option<u32>,
    ) -> Result<()> {
        self.ensure_idle()?;
        validate_entry_name(name)?;

        if options.overwrite && self.index()?.contains(name) {
            crate::rebuild::rebuild_without(self, &[name])?;
        }

        let is_directory = name.ends_with('/');
        let level = if is_directory {
            CompressionLevel::None
        } else {
            options.level
        };
        let password: Option<Vec<u8>> = if is_directory {
            // Directory entries carry no data worth encrypting
            None
        } else {
            options.password.clone().or_else(|| self.password.clone())
        };

        let index = self.index()?;
        if index.len() + 1 > u16::MAX as usize {
            return Err(Error::Parameter(format!(
                "archive already holds {} entries",
                u16::MAX
            )));
        }
        let cd_offset = index.cd_offset();
        if cd_offset > u32::MAX as u64 {
            return Err(Error::Parameter(
                "archive exceeds the 4 GiB ZIP offset limit".into(),
            ));
        }
        let retained = index.records().to_vec();
        let comment = index.comment().to_vec();

        let timestamp = options.modified.unwrap_or_else(Timestamp::now);
        let mode_bits = options
            .permissions
            .unwrap_or(if is_directory { 0o755 } else { 0o644 });
        let file_type = if is_directory { 0o040000 } else { 0o100000 };
        let mut external_attrs = (file_type | mode_bits) << 16;
        if is_directory {
            external_attrs |= DOS_ATTR_DIRECTORY;
        }

        let mut flags = EntryRecord::name_flags(name);
        if password.is_some() {
            flags |= FLAG_ENCRYPTED;
            if known_crc.is_none() {
                flags |= FLAG_DATA_DESCRIPTOR;
            }
        }

        let record = EntryRecord {
            name: name.to_string(),
            version_made_by: (SYSTEM_UNIX << 8) | crate::format::VERSION_NEEDED,
            flags,
            method: level.method_id(),
            dos_time: timestamp.dos_time(),
            dos_date: timestamp.dos_date(),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            external_attrs,
            header_start: cd_offset as u32,
        };

        let open_err = |source: std::io::Error| Error::FileOpenForWrite {
            path: name.to_string(),
            source,
        };

        let mut file = self.open_file_rw()?;
        file.seek(SeekFrom::Start(cd_offset)).map_err(open_err)?;
        record.write_local(&mut file)?;
        let data_start = cd_offset + record.local_header_len();

        let sink = match &password {
            Some(password) => {
                let check_byte = match known_crc {
                    Some(crc) => (crc >> 24) as u8,
                    None => (record.dos_time >> 8) as u8,
                };
                let writer =
                    EncryptingWriter::new(file, password, check_byte).map_err(open_err)?;
                WriteSink::Encrypted(EntryEncoder::new(writer, level)?)
            }
            None => WriteSink::Plain(EntryEncoder::new(file, level)?),
        };

        debug!("begin_write '{}' at offset {}", name, cd_offset);
        self.stream = StreamState::Writing(WriteStream {
            record,
            sink,
            hasher: crc32fast::Hasher::new(),
            uncompressed: 0,
            data_start,
            retained,
            comment,
        });
        Ok(())
    }

    /// Appends a chunk of content to the open write stream.
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        let StreamState::Writing(stream) = &mut self.stream else {
            return Err(Error::MixedModeAccess {
                mode: self.mode(),
            });
        };
        stream.hasher.update(data);
        stream.uncompressed += data.len() as u64;
        stream.sink.write_all(data).map_err(|source| Error::FileWrite {
            path: stream.record.name.clone(),
            source,
        })
    }

    /// Finalizes an open write stream.
    ///
    /// Called from `end_stream`; the stream has already been taken out of
    /// the session state, so any failure here leaves the session idle.
    pub(crate) fn finish_write(&mut self, stream: WriteStream) -> Result<()> {
        // The directory region was overwritten at begin_write; the cached
        // index is stale no matter how finalization ends
        self.invalidate_index();
        let WriteStream {
            mut record,
            sink,
            hasher,
            uncompressed,
            data_start,
            retained,
            comment,
        } = stream;

        let close_err = |source: std::io::Error| Error::FileCloseWriting {
            path: record.name.clone(),
            source,
        };

        let mut file = sink.finish().map_err(close_err)?;
        let data_end = file.stream_position().map_err(close_err)?;
        let compressed = data_end - data_start;
        if compressed > u32::MAX as u64 || uncompressed > u32::MAX as u64 {
            return Err(Error::Parameter(
                "entry data exceeds the 4 GiB ZIP size limit".into(),
            ));
        }
        record.crc32 = hasher.finalize();
        record.compressed_size = compressed as u32;
        record.uncompressed_size = uncompressed as u32;

        records::patch_local_sizes(
            &mut file,
            record.header_start as u64,
            record.crc32,
            record.compressed_size,
            record.uncompressed_size,
        )
        .map_err(close_err)?;

        file.seek(SeekFrom::Start(data_end)).map_err(close_err)?;
        if record.flags & FLAG_DATA_DESCRIPTOR != 0 {
            records::write_data_descriptor(
                &mut file,
                record.crc32,
                record.compressed_size,
                record.uncompressed_size,
            )
            .map_err(close_err)?;
        }
        let cd_start = file.stream_position().map_err(close_err)?;
        for r in &retained {
            r.write_central(&mut file)?;
        }
        record.write_central(&mut file)?;
        let cd_end = file.stream_position().map_err(close_err)?;
        if cd_end > u32::MAX as u64 {
            return Err(Error::Parameter(
                "archive exceeds the 4 GiB ZIP offset limit".into(),
            ));
        }
        let eocd = EndOfCentralDirectory {
            entry_count: (retained.len() + 1) as u16,
            cd_size: (cd_end - cd_start) as u32,
            cd_offset: cd_start as u32,
            comment,
        };
        eocd.write(&mut file)?;
        let file_end = file.stream_position().map_err(close_err)?;
        file.set_len(file_end).map_err(close_err)?;
        file.sync_all().map_err(close_err)?;

        debug!(
            "finished '{}': {} -> {} bytes",
            record.name, record.uncompressed_size, record.compressed_size
        );
        Ok(())
    }

    /// Writes a whole entry from an in-memory buffer.
    ///
    /// The CRC-32 is computed up front, so encrypted entries written this
    /// way use the stronger CRC-based password check byte.
    pub fn write_bytes(&mut self, name: &str, data: &[u8], options: &WriteOptions) -> Result<()> {
        self.write_bytes_with_progress(name, data, options, |_| {})
    }

    /// Writes a whole entry from an in-memory buffer, reporting progress.
    ///
    /// The buffer is submitted in internal chunks; `progress` is invoked
    /// after each one with the percentage of `data` written so far, ending
    /// at 100.
    pub fn write_bytes_with_progress<F>(
        &mut self,
        name: &str,
        data: &[u8],
        options: &WriteOptions,
        mut progress: F,
    ) -> Result<()>
    where
        F: FnMut(u8),
    {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(data);
        let crc = hasher.finalize();

        self.begin_write_inner(name, options, Some(crc))?;
        let total = data.len() as u64;
        let mut submitted = 0u64;
        for chunk in data.chunks(READ_BUFFER_SIZE) {
            if let Err(e) = self.write_chunk(chunk) {
                self.end_stream().ok();
                return Err(e);
            }
            submitted += chunk.len() as u64;
            progress((submitted * 100 / total) as u8);
        }
        self.end_stream()
    }

    /// Writes an entry from a producer callback, for content that is
    /// generated or too large to buffer.
    ///
    /// The producer receives a [`ChunkSink`] and submits chunks in order.
    /// If the producer fails, the entry is still closed with the chunks
    /// submitted so far before the producer's error is returned.
    pub fn write_stream<F>(&mut self, name: &str, options: &WriteOptions, producer: F) -> Result<()>
    where
        F: FnOnce(&mut ChunkSink<'_, '_>) -> Result<()>,
    {
        self.write_stream_inner(name, options, producer, None)
    }

    /// Like [`write_stream`][Self::write_stream], with per-chunk progress.
    ///
    /// A streamed entry's total size is unknown, so the percentage is
    /// best-effort: computed against [`WriteOptions::size_hint`] and capped
    /// at 100, or a flat 0 when no hint was supplied.
    pub fn write_stream_with_progress<F, P>(
        &mut self,
        name: &str,
        options: &WriteOptions,
        producer: F,
        mut progress: P,
    ) -> Result<()>
    where
        F: FnOnce(&mut ChunkSink<'_, '_>) -> Result<()>,
        P: FnMut(u8),
    {
        self.write_stream_inner(name, options, producer, Some(&mut progress))
    }

    fn write_stream_inner<F>(
        &mut self,
        name: &str,
        options: &WriteOptions,
        producer: F,
        progress: Option<&mut dyn FnMut(u8)>,
    ) -> Result<()>
    where
        F: FnOnce(&mut ChunkSink<'_, '_>) -> Result<()>,
    {
        self.begin_write(name, options)?;
        let mut sink = ChunkSink {
            archive: self,
            submitted: 0,
            size_hint: options.size_hint,
            progress,
        };
        let produced = producer(&mut sink);
        let closed = self.end_stream();
        produced?;
        closed
    }

    /// Writes a directory entry.
    ///
    /// A trailing `/` is added to the name when missing. Directory entries
    /// carry no data and are never compressed or encrypted.
    pub fn write_directory(&mut self, name: &str, options: &WriteOptions) -> Result<()> {
        let dir_name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{}/", name)
        };
        self.begin_write_inner(&dir_name, options, Some(0))?;
        self.end_stream()
    }

    /// Copies a file from the filesystem into the archive.
    ///
    /// The source's modification time and (on Unix) permission bits are
    /// recorded unless `options` overrides them.
    pub fn write_file<P: AsRef<Path>>(
        &mut self,
        name: &str,
        source: P,
        options: &WriteOptions,
    ) -> Result<()> {
        let source = source.as_ref();
        let mut input = fs::File::open(source).map_err(|e| Error::FileOpenForWrite {
            path: name.to_string(),
            source: e,
        })?;

        let mut options = options.clone();
        if let Ok(meta) = input.metadata() {
            if options.modified.is_none() {
                if let Ok(modified) = meta.modified() {
                    options.modified = Some(Timestamp::from_system_time(modified));
                }
            }
            #[cfg(unix)]
            if options.permissions.is_none() {
                use std::os::unix::fs::MetadataExt;
                options.permissions = Some(meta.mode() & 0o7777);
            }
        }

        self.begin_write(name, &options)?;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = match input.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    self.end_stream().ok();
                    return Err(Error::FileRead {
                        path: name.to_string(),
                        source: e,
                    });
                }
            };
            if let Err(e) = self.write_chunk(&buf[..n]) {
                self.end_stream().ok();
                return Err(e);
            }
        }
        self.end_stream()
    }
}

/// Hands produced chunks to an open write stream.
///
/// See [`Archive::write_stream`].
pub struct ChunkSink<'a, 'p> {
    archive: &'a mut Archive,
    submitted: u64,
    size_hint: Option<u64>,
    progress: Option<&'p mut dyn FnMut(u8)>,
}

impl ChunkSink<'_, '_> {
    /// Appends one chunk to the entry being written.
    pub fn submit(&mut self, data: &[u8]) -> Result<()> {
        self.archive.write_chunk(data)?;
        self.submitted += data.len() as u64;
        if let Some(progress) = self.progress.as_deref_mut() {
            let percent = match self.size_hint {
                Some(hint) if hint > 0 => (self.submitted * 100 / hint).min(100) as u8,
                _ => 0,
            };
            progress(percent);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ChunkSink<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkSink")
            .field("submitted", &self.submitted)
            .finish_non_exhaustive()
    }
}
