//! Archive rebuild for destructive edits.
//!
//! ZIP has no in-place delete; removing an entry means writing a new
//! archive without it. The rebuild copies each retained entry's compressed
//! bytes verbatim (no recompression, and encrypted data stays encrypted),
//! writes a fresh central directory, and atomically replaces the original
//! file. A failure at any point leaves the original archive untouched.

use std::io::{self, Read, Seek, SeekFrom, Write};

use log::debug;
use tempfile::NamedTempFile;

use crate::archive::Archive;
use crate::format::FLAG_DATA_DESCRIPTOR;
use crate::format::records::{self, EndOfCentralDirectory};
use crate::{Error, Result};

impl Archive {
    /// Deletes an entry from the archive.
    ///
    /// All records carrying the name are removed, including duplicates
    /// left by repeated appends. The archive is rebuilt into a temporary
    /// sibling file and swapped in atomically on success.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        self.ensure_idle()?;
        if !self.index()?.contains(name) {
            return Err(Error::EntryNotFound {
                path: name.to_string(),
            });
        }
        rebuild_without(self, &[name]).map_err(|e| match e {
            e @ Error::ArchiveNotFound { .. } => e,
            e => Error::DeleteFile {
                path: name.to_string(),
                reason: e.to_string(),
            },
        })
    }
}

/// Rewrites the archive, dropping every record whose name is in `names`.
///
/// The session must already be idle. Callers map errors into their own
/// taxonomy; everything here surfaces as the underlying fault.
pub(crate) fn rebuild_without(archive: &mut Archive, names: &[&str]) -> Result<()> {
    let index = archive.index()?;
    let retained: Vec<_> = index
        .records()
        .iter()
        .filter(|r| !names.contains(&r.name.as_str()))
        .cloned()
        .collect();
    let comment = index.comment().to_vec();
    let dropped = index.len() - retained.len();

    let mut source = archive.open_file()?;
    let parent = match archive.path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => std::path::Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(parent)?;

    let mut new_records = Vec::with_capacity(retained.len());
    for record in retained {
        let data_start = records::local_data_start(&mut source, record.header_start as u64)?;
        let new_start = temp.as_file_mut().stream_position()?;
        if new_start > u32::MAX as u64 {
            return Err(Error::Parameter(
                "archive exceeds the 4 GiB ZIP offset limit".into(),
            ));
        }

        let mut record = record;
        record.header_start = new_start as u32;
        record.write_local(temp.as_file_mut())?;

        // Compressed bytes are copied verbatim; the span includes the
        // ZipCrypto header for encrypted entries.
        source.seek(SeekFrom::Start(data_start))?;
        let mut data = (&mut source).take(record.compressed_size as u64);
        let copied = io::copy(&mut data, temp.as_file_mut())?;
        if copied != record.compressed_size as u64 {
            return Err(Error::BadZipFile(format!(
                "entry '{}' is truncated: {} of {} compressed bytes present",
                record.name, copied, record.compressed_size
            )));
        }
        // Entries flagged as streamed get their descriptor rebuilt from the
        // central record; the copied span ends at the compressed data
        if record.flags & FLAG_DATA_DESCRIPTOR != 0 {
            records::write_data_descriptor(
                temp.as_file_mut(),
                record.crc32,
                record.compressed_size,
                record.uncompressed_size,
            )?;
        }
        new_records.push(record);
    }

    let cd_start = temp.as_file_mut().stream_position()?;
    for record in &new_records {
        record.write_central(temp.as_file_mut())?;
    }
    let cd_end = temp.as_file_mut().stream_position()?;
    if cd_end > u32::MAX as u64 {
        return Err(Error::Parameter(
            "archive exceeds the 4 GiB ZIP offset limit".into(),
        ));
    }
    let eocd = EndOfCentralDirectory {
        entry_count: new_records.len() as u16,
        cd_size: (cd_end - cd_start) as u32,
        cd_offset: cd_start as u32,
        comment,
    };
    eocd.write(temp.as_file_mut())?;
    temp.as_file_mut().flush()?;
    temp.as_file_mut().sync_all()?;

    drop(source);
    temp.persist(&archive.path).map_err(|e| Error::Io(e.error))?;
    debug!(
        "rebuilt {} without {} record(s), {} retained",
        archive.path.display(),
        dropped,
        new_records.len()
    );
    archive.invalidate_index();
    Ok(())
}
