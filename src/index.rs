//! Central directory index.
//!
//! [`DirectoryIndex`] is the in-memory snapshot of an archive's central
//! directory, built in one pass when the archive is opened or after any
//! mutation. Lookups by name resolve to the last record with that name,
//! matching how extraction tools treat duplicate entries.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

use log::debug;

use crate::format::records::{EndOfCentralDirectory, EntryRecord};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub(crate) struct DirectoryIndex {
    records: Vec<EntryRecord>,
    by_name: HashMap<String, usize>,
    cd_offset: u64,
    comment: Vec<u8>,
}

impl DirectoryIndex {
    /// Scans the central directory and builds the index.
    pub fn load<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let (eocd, eocd_pos) = EndOfCentralDirectory::find_and_parse(reader)?;
        if (eocd.cd_offset as u64).saturating_add(eocd.cd_size as u64) > eocd_pos {
            return Err(Error::BadZipFile(
                "central directory extends past its end record".into(),
            ));
        }

        reader.seek(SeekFrom::Start(eocd.cd_offset as u64))?;
        let mut records = Vec::with_capacity(eocd.entry_count as usize);
        let mut by_name = HashMap::with_capacity(eocd.entry_count as usize);
        for _ in 0..eocd.entry_count {
            let record = EntryRecord::parse(reader)?;
            by_name.insert(record.name.clone(), records.len());
            records.push(record);
        }
        debug!("indexed {} entries", records.len());

        Ok(Self {
            records,
            by_name,
            cd_offset: eocd.cd_offset as u64,
            comment: eocd.comment,
        })
    }

    /// All records, in central directory order.
    pub fn records(&self) -> &[EntryRecord] {
        &self.records
    }

    /// Looks up an entry by name, resolving duplicates to the last record.
    pub fn find(&self, name: &str) -> Option<&EntryRecord> {
        self.by_name.get(name).map(|&i| &self.records[i])
    }

    /// Returns true if any record carries the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// File offset where the central directory begins.
    ///
    /// New entry data is appended here; the directory is rewritten after it.
    pub fn cd_offset(&self) -> u64 {
        self.cd_offset
    }

    /// The archive-level comment from the end record.
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{SYSTEM_UNIX, ZIP_METHOD_STORED};
    use std::io::Cursor;

    fn record(name: &str, header_start: u32) -> EntryRecord {
        EntryRecord {
            name: name.to_string(),
            version_made_by: (SYSTEM_UNIX << 8) | 20,
            flags: 0,
            method: ZIP_METHOD_STORED,
            dos_time: 0,
            dos_date: 0x0021,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            external_attrs: 0,
            header_start,
        }
    }

    fn archive_with(records: &[EntryRecord], comment: &[u8]) -> Vec<u8> {
        // Local headers are not parsed during indexing; padding stands in
        // for entry data.
        let cd_offset = 64u32;
        let mut buf = vec![0u8; cd_offset as usize];
        for r in records {
            r.write_central(&mut buf).unwrap();
        }
        let cd_size = buf.len() as u32 - cd_offset;
        let eocd = EndOfCentralDirectory {
            entry_count: records.len() as u16,
            cd_size,
            cd_offset,
            comment: comment.to_vec(),
        };
        eocd.write(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_load_and_find() {
        let buf = archive_with(&[record("a.txt", 0), record("b.txt", 30)], b"hello");
        let index = DirectoryIndex::load(&mut Cursor::new(buf)).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.find("a.txt").unwrap().header_start, 0);
        assert_eq!(index.find("b.txt").unwrap().header_start, 30);
        assert!(index.find("c.txt").is_none());
        assert_eq!(index.comment(), b"hello");
        assert_eq!(index.cd_offset(), 64);
    }

    #[test]
    fn test_duplicate_names_resolve_to_last() {
        let buf = archive_with(&[record("same.txt", 0), record("same.txt", 100)], b"");
        let index = DirectoryIndex::load(&mut Cursor::new(buf)).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.find("same.txt").unwrap().header_start, 100);
    }

    #[test]
    fn test_empty_archive() {
        let mut buf = Vec::new();
        EndOfCentralDirectory::empty().write(&mut buf).unwrap();
        let index = DirectoryIndex::load(&mut Cursor::new(buf)).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.cd_offset(), 0);
    }

    #[test]
    fn test_directory_past_end_record() {
        let mut buf = Vec::new();
        let eocd = EndOfCentralDirectory {
            entry_count: 1,
            cd_size: 1000,
            cd_offset: 0,
            comment: Vec::new(),
        };
        eocd.write(&mut buf).unwrap();
        assert!(matches!(
            DirectoryIndex::load(&mut Cursor::new(buf)),
            Err(Error::BadZipFile(_))
        ));
    }
}
