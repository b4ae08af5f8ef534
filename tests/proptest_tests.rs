//! Property-based tests: whatever goes into an archive comes back out.

mod common;

use std::collections::HashMap;

use proptest::prelude::*;
use zipkit::{Archive, CompressionLevel, WriteOptions};

fn entry_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}\\.[a-z]{1,3}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_single_entry_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..16_384)) {
        let dir = common::temp_dir();
        let path = dir.path().join("prop.zip");
        let mut archive = Archive::create_path(&path).unwrap();
        archive.write_bytes("data.bin", &data, &WriteOptions::default()).unwrap();

        let mut reopened = Archive::open_path(&path).unwrap();
        prop_assert_eq!(reopened.extract_to_vec("data.bin").unwrap(), data);
    }

    #[test]
    fn prop_stored_and_deflated_agree(data in proptest::collection::vec(any::<u8>(), 0..8_192)) {
        let dir = common::temp_dir();
        let path = dir.path().join("prop.zip");
        let mut archive = Archive::create_path(&path).unwrap();
        archive.write_bytes(
            "stored.bin",
            &data,
            &WriteOptions::new().level(CompressionLevel::None),
        ).unwrap();
        archive.write_bytes(
            "deflated.bin",
            &data,
            &WriteOptions::new().level(CompressionLevel::Best),
        ).unwrap();

        let stored = archive.extract_to_vec("stored.bin").unwrap();
        let deflated = archive.extract_to_vec("deflated.bin").unwrap();
        prop_assert_eq!(&stored, &data);
        prop_assert_eq!(&deflated, &data);
    }

    #[test]
    fn prop_multiple_entries_roundtrip(
        entries in proptest::collection::hash_map(
            entry_name(),
            proptest::collection::vec(any::<u8>(), 0..2_048),
            1..8,
        )
    ) {
        let dir = common::temp_dir();
        let path = dir.path().join("prop.zip");
        let mut archive = Archive::create_path(&path).unwrap();
        for (name, data) in &entries {
            archive.write_bytes(name, data, &WriteOptions::default()).unwrap();
        }

        let mut reopened = Archive::open_path(&path).unwrap();
        prop_assert_eq!(reopened.len().unwrap(), entries.len());
        for (name, data) in &entries {
            prop_assert_eq!(&reopened.extract_to_vec(name).unwrap(), data);
        }
    }

    #[test]
    fn prop_delete_preserves_other_entries(
        entries in proptest::collection::hash_map(
            entry_name(),
            proptest::collection::vec(any::<u8>(), 0..1_024),
            2..6,
        )
    ) {
        let dir = common::temp_dir();
        let path = dir.path().join("prop.zip");
        let mut archive = Archive::create_path(&path).unwrap();
        let mut expected: HashMap<String, Vec<u8>> = HashMap::new();
        for (name, data) in &entries {
            archive.write_bytes(name, data, &WriteOptions::default()).unwrap();
            expected.insert(name.clone(), data.clone());
        }

        let victim = entries.keys().next().unwrap().clone();
        archive.delete(&victim).unwrap();
        expected.remove(&victim);

        let mut reopened = Archive::open_path(&path).unwrap();
        prop_assert_eq!(reopened.len().unwrap(), expected.len());
        for (name, data) in &expected {
            prop_assert_eq!(&reopened.extract_to_vec(name).unwrap(), data);
        }
    }

    #[test]
    fn prop_encrypted_roundtrip(
        data in proptest::collection::vec(any::<u8>(), 1..4_096),
        password in "[ -~]{1,16}",
    ) {
        let dir = common::temp_dir();
        let path = dir.path().join("prop.zip");
        let mut archive = Archive::create_path(&path).unwrap().with_password(password.clone());
        archive.write_bytes("sealed.bin", &data, &WriteOptions::default()).unwrap();

        let mut reopened = Archive::open_path(&path).unwrap().with_password(password);
        prop_assert!(reopened.info("sealed.bin").unwrap().is_encrypted());
        prop_assert_eq!(reopened.extract_to_vec("sealed.bin").unwrap(), data);
    }
}
