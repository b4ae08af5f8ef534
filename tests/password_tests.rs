//! Password and encryption tests for ZipCrypto-protected entries.

mod common;

use std::fs;

use zipkit::{Archive, Error, WriteOptions};

#[test]
fn test_encrypted_roundtrip() {
    let dir = common::temp_dir();
    let path = dir.path().join("secret.zip");
    let mut archive = Archive::create_path(&path).unwrap().with_password("hunter2");
    archive
        .write_bytes("vault.txt", b"the combination is 12345", &WriteOptions::default())
        .unwrap();

    let info = archive.info("vault.txt").unwrap();
    assert!(info.is_encrypted());
    // Encrypted sizes include the 12-byte encryption header
    assert!(info.compressed_size() >= 12);

    let mut reopened = Archive::open_path(&path).unwrap().with_password("hunter2");
    assert_eq!(
        reopened.extract_to_vec("vault.txt").unwrap(),
        b"the combination is 12345"
    );
}

#[test]
fn test_wrong_password_fails() {
    let dir = common::temp_dir();
    let path = dir.path().join("secret.zip");
    let mut archive = Archive::create_path(&path).unwrap().with_password("correct");
    archive
        .write_bytes("vault.txt", b"classified material", &WriteOptions::default())
        .unwrap();

    // The 8-bit check byte catches most wrong passwords immediately; the
    // rare pass-through still fails CRC verification on the garbage output
    let mut reopened = Archive::open_path(&path).unwrap().with_password("incorrect");
    let result = reopened.extract_to_vec("vault.txt");
    assert!(
        matches!(
            result,
            Err(Error::InvalidPassword { .. }) | Err(Error::CrcMismatch { .. }) | Err(Error::Zlib(_))
        ),
        "wrong password was accepted: {:?}",
        result.map(|d| d.len())
    );
}

#[test]
fn test_missing_password_fails() {
    let dir = common::temp_dir();
    let path = dir.path().join("secret.zip");
    let mut archive = Archive::create_path(&path).unwrap().with_password("pw");
    archive
        .write_bytes("vault.txt", b"data", &WriteOptions::default())
        .unwrap();

    let mut reopened = Archive::open_path(&path).unwrap();
    assert!(matches!(
        reopened.extract_to_vec("vault.txt"),
        Err(Error::InvalidPassword { .. })
    ));
}

#[test]
fn test_validate_password() {
    let dir = common::temp_dir();
    let path = dir.path().join("secret.zip");
    let mut archive = Archive::create_path(&path).unwrap().with_password("sesame");
    archive
        .write_bytes("a.txt", b"encrypted content", &WriteOptions::default())
        .unwrap();

    let mut right = Archive::open_path(&path).unwrap().with_password("sesame");
    assert!(right.validate_password().unwrap());
    // Validation leaves the session idle and usable
    assert_eq!(right.extract_to_vec("a.txt").unwrap(), b"encrypted content");

    let mut missing = Archive::open_path(&path).unwrap();
    assert!(!missing.validate_password().unwrap());
}

#[test]
fn test_validate_password_without_encryption() {
    let dir = common::temp_dir();
    let entries: &[(&str, &[u8])] = &[("plain.txt", b"nothing secret")];
    let (mut archive, _) = common::create_archive(&dir, entries);

    assert!(!archive.is_password_protected().unwrap());
    // Any password validates against an unencrypted archive
    archive.set_password(Some("whatever"));
    assert!(archive.validate_password().unwrap());
}

#[test]
fn test_mixed_plain_and_encrypted_entries() {
    let dir = common::temp_dir();
    let path = dir.path().join("mixed.zip");
    let mut archive = Archive::create_path(&path).unwrap();
    archive
        .write_bytes("public.txt", b"open", &WriteOptions::default())
        .unwrap();
    archive
        .write_bytes(
            "private.txt",
            b"sealed",
            &WriteOptions::new().password("entry-pw"),
        )
        .unwrap();

    assert!(archive.is_password_protected().unwrap());
    assert!(!archive.info("public.txt").unwrap().is_encrypted());
    assert!(archive.info("private.txt").unwrap().is_encrypted());

    // The plain entry reads without any password
    let mut reopened = Archive::open_path(&path).unwrap();
    assert_eq!(reopened.extract_to_vec("public.txt").unwrap(), b"open");

    reopened.set_password(Some("entry-pw"));
    assert_eq!(reopened.extract_to_vec("private.txt").unwrap(), b"sealed");
}

#[test]
fn test_streamed_encrypted_write() {
    let dir = common::temp_dir();
    let path = dir.path().join("streamed.zip");
    let mut archive = Archive::create_path(&path).unwrap().with_password("flow");

    // Streamed writes derive the password check byte from the timestamp
    // instead of the (unknown) CRC
    archive
        .begin_write("stream.bin", &WriteOptions::default())
        .unwrap();
    let chunk = vec![0x5Au8; 10_000];
    for _ in 0..5 {
        archive.write_chunk(&chunk).unwrap();
    }
    archive.end_stream().unwrap();

    let mut reopened = Archive::open_path(&path).unwrap().with_password("flow");
    let data = reopened.extract_to_vec("stream.bin").unwrap();
    assert_eq!(data.len(), 50_000);
    assert!(data.iter().all(|&b| b == 0x5A));
}

#[test]
fn test_streamed_encrypted_write_emits_descriptor() {
    let dir = common::temp_dir();
    let path = dir.path().join("descriptor.zip");
    let mut archive = Archive::create_path(&path).unwrap().with_password("flow");

    archive.begin_write("s.bin", &WriteOptions::default()).unwrap();
    archive.write_chunk(b"sealed stream data").unwrap();
    archive.end_stream().unwrap();
    let info = archive.info("s.bin").unwrap();

    let u32_at = |bytes: &[u8], off: usize| {
        u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap())
    };

    // A descriptor record follows the compressed data, for readers that
    // honor the data-descriptor flag
    let bytes = fs::read(&path).unwrap();
    let at = 30 + "s.bin".len() + info.compressed_size() as usize;
    assert_eq!(u32_at(&bytes, at), 0x0807_4B50);
    assert_eq!(u32_at(&bytes, at + 4), info.crc32());
    assert_eq!(u32_at(&bytes, at + 8), info.compressed_size() as u32);
    assert_eq!(u32_at(&bytes, at + 12), info.uncompressed_size() as u32);

    // A rebuild puts the descriptor back after the copied data
    archive
        .write_bytes("scratch.txt", b"temporary", &WriteOptions::default())
        .unwrap();
    archive.delete("scratch.txt").unwrap();
    let rebuilt = fs::read(&path).unwrap();
    assert_eq!(u32_at(&rebuilt, at), 0x0807_4B50);
    assert_eq!(archive.extract_to_vec("s.bin").unwrap(), b"sealed stream data");
}

#[test]
fn test_encrypted_stored_entry() {
    let dir = common::temp_dir();
    let path = dir.path().join("stored.zip");
    let mut archive = Archive::create_path(&path).unwrap().with_password("pw");
    let options = WriteOptions::new().level(zipkit::CompressionLevel::None);
    archive.write_bytes("raw.bin", b"stored and sealed", &options).unwrap();

    let info = archive.info("raw.bin").unwrap();
    assert_eq!(info.compressed_size(), 17 + 12);

    let mut reopened = Archive::open_path(&path).unwrap().with_password("pw");
    assert_eq!(
        reopened.extract_to_vec("raw.bin").unwrap(),
        b"stored and sealed"
    );
}

#[test]
fn test_passwords_are_byte_exact() {
    let dir = common::temp_dir();
    let path = dir.path().join("unicode-pw.zip");
    let mut archive = Archive::create_path(&path).unwrap().with_password("p\u{00E4}ss");
    archive
        .write_bytes("f.txt", b"umlaut protected", &WriteOptions::default())
        .unwrap();

    let mut reopened = Archive::open_path(&path).unwrap().with_password("p\u{00E4}ss");
    assert_eq!(reopened.extract_to_vec("f.txt").unwrap(), b"umlaut protected");
}
