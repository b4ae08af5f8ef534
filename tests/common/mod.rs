//! Shared test utilities for integration tests.
//!
//! Archives in these tests live in per-test temporary directories; helpers
//! here create populated archives and verify their contents.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test
//! file compiles as a separate crate and may only use a subset of these
//! helpers.

#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;
use zipkit::{Archive, WriteOptions};

/// Creates a temporary directory for one test's archives.
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// Creates a new archive in `dir` populated with the given entries.
///
/// Returns the open handle and the archive's path.
pub fn create_archive(dir: &TempDir, entries: &[(&str, &[u8])]) -> (Archive, PathBuf) {
    let path = dir.path().join("test.zip");
    let mut archive = Archive::create_path(&path).expect("Failed to create archive");
    for (name, data) in entries {
        archive
            .write_bytes(name, data, &WriteOptions::default())
            .expect("Failed to write entry");
    }
    (archive, path)
}

/// Extracts every expected entry and compares content byte for byte.
pub fn verify_contents(archive: &mut Archive, entries: &[(&str, &[u8])]) {
    for (name, data) in entries {
        let extracted = archive
            .extract_to_vec(name)
            .unwrap_or_else(|e| panic!("Failed to extract '{}': {}", name, e));
        assert_eq!(&extracted, data, "content mismatch for '{}'", name);
    }
}

/// Re-opens the archive from disk and verifies the same contents, proving
/// the bytes on disk (not just the cached index) are good.
pub fn verify_reopened(path: &PathBuf, entries: &[(&str, &[u8])]) {
    let mut archive = Archive::open_path(path).expect("Failed to reopen archive");
    assert_eq!(archive.len().unwrap(), entries.len());
    verify_contents(&mut archive, entries);
}
