use std::io::Cursor;

use rsdbpf::{
    deflate, CancelToken, Error, NameMap, Package, PackageConfig, PackageHeader, Resource,
    ResourceKey, HEADER_SIZE,
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn save_to_bytes(package: &mut Package) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    package.save_to_stream(&mut cursor).unwrap();
    cursor.into_inner()
}

#[test]
fn new_package_name_map_round_trip() {
    let key = ResourceKey::new(0x0166_038C, 0, 0x1);
    let mut names = NameMap::new_empty(key);
    names.insert(0xDEAD_BEEF_CAFE_BABE, "name");
    let payload = names.serialize().unwrap();
    // version + count + hash + length + "name" as UTF-16.
    assert_eq!(payload.len(), 28);

    let mut package = Package::create_new();
    package.add(key, payload.clone(), true).unwrap();
    let bytes = save_to_bytes(&mut package);

    let mut reopened = Package::from_bytes(bytes).unwrap();
    assert_eq!(reopened.len(), 1);
    let entry = reopened.entries().next().unwrap();
    assert_eq!(entry.key(), key);
    assert_eq!(entry.chunk_offset(), HEADER_SIZE as u32);
    assert_eq!(entry.file_size(), 28);
    assert_eq!(entry.memory_size(), 28);
    let id = entry.id();
    assert_eq!(reopened.payload(id).unwrap(), payload.as_slice());

    let resource = reopened.resource(id).unwrap();
    let map = resource.as_name_map().unwrap();
    assert_eq!(map.get(0xDEAD_BEEF_CAFE_BABE), Some("name"));
}

#[test]
fn shared_field_index_election() {
    let mut package = Package::create_new();
    for i in 0..10u64 {
        // Distinct instance high halves keep bit 2 clear.
        let instance = (i + 1) << 32 | i;
        package
            .add(ResourceKey::new(0x034A_EECB, 0, instance), vec![i as u8], true)
            .unwrap();
    }
    let bytes = save_to_bytes(&mut package);

    let header_bytes: [u8; 96] = bytes[..96].try_into().unwrap();
    let header = PackageHeader::from(&header_bytes).unwrap();
    // Flags word + two shared values + ten 24-byte entries.
    assert_eq!(header.index_size, 4 + 4 + 4 + 240);
    assert_eq!(header.index_count, 10);

    let index_start = header.index_position as usize;
    let flags = u32::from_le_bytes(bytes[index_start..index_start + 4].try_into().unwrap());
    assert_eq!(flags & 0x7, 0x3);

    let reopened = Package::from_bytes(bytes).unwrap();
    let keys: Vec<_> = reopened.entries().map(|e| e.key()).collect();
    assert_eq!(keys.len(), 10);
    assert!(keys.iter().all(|k| k.type_id == 0x034A_EECB && k.group == 0));
    assert_eq!(keys[7].instance, 8u64 << 32 | 7);
}

#[test]
fn key_multiset_and_order_survive_reopen() {
    let mut package = Package::create_new();
    let keys: Vec<ResourceKey> = (0..6u64)
        .map(|i| ResourceKey::new(0x545A_C67A, (i % 3) as u32, 0x100 + i))
        .collect();
    for (i, key) in keys.iter().enumerate() {
        package.add(*key, vec![i as u8; i + 1], false).unwrap();
    }
    let bytes = save_to_bytes(&mut package);

    let reopened = Package::from_bytes(bytes).unwrap();
    let reopened_meta: Vec<_> = reopened
        .entries()
        .map(|e| (e.key(), e.memory_size(), e.file_size(), e.compression_type()))
        .collect();
    let expected: Vec<_> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| (*key, (i + 1) as u32, (i + 1) as u32, 0u16))
        .collect();
    assert_eq!(reopened_meta, expected);
}

#[test]
fn deleted_entry_absent_after_reopen() {
    let mut package = Package::create_new();
    let keep = ResourceKey::new(1, 0, 1);
    let drop = ResourceKey::new(1, 0, 2);
    package.add(keep, vec![1], true).unwrap();
    let id = package.add(drop, vec![2], true).unwrap();
    package.delete(id).unwrap();

    assert!(package.find(drop).is_none());
    let bytes = save_to_bytes(&mut package);
    let reopened = Package::from_bytes(bytes).unwrap();
    assert_eq!(reopened.len(), 1);
    assert!(reopened.find(drop).is_none());
    assert!(reopened.find(keep).is_some());
}

#[test]
fn compressed_entries_stay_compressed_across_save() {
    // Hand-build an archive holding one zlib-deflated payload.
    let payload = b"the quick brown fox jumps over the lazy dog, twice over".repeat(4);
    let deflated = deflate(&payload).unwrap();

    let mut bytes = Vec::new();
    let mut index = Vec::new();
    index.extend_from_slice(&0u32.to_le_bytes()); // no shared fields
    index.extend_from_slice(&0x1234_5678u32.to_le_bytes());
    index.extend_from_slice(&0u32.to_le_bytes());
    index.extend_from_slice(&0u32.to_le_bytes());
    index.extend_from_slice(&0x42u32.to_le_bytes());
    index.extend_from_slice(&96u32.to_le_bytes());
    index.extend_from_slice(&(deflated.len() as u32 | 0x8000_0000).to_le_bytes());
    index.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    index.extend_from_slice(&0x5A42u16.to_le_bytes());
    index.extend_from_slice(&1u16.to_le_bytes());

    let header = PackageHeader {
        user_version_major: 0,
        user_version_minor: 0,
        created: 0,
        updated: 0,
        index_count: 1,
        index_position_legacy: 0,
        index_size: index.len() as u32,
        index_position: (96 + deflated.len()) as u32,
    };
    bytes.extend_from_slice(&header.write());
    bytes.extend_from_slice(&deflated);
    bytes.extend_from_slice(&index);

    let mut package = Package::from_bytes(bytes).unwrap();
    let key = ResourceKey::new(0x1234_5678, 0, 0x42);
    let id = package.find(key).unwrap().id();
    assert!(package.find(key).unwrap().is_compressed());
    assert_eq!(package.payload(id).unwrap(), payload.as_slice());

    // Mutate so the save path re-deflates rather than byte-copies.
    package.replace(id, payload.clone()).unwrap();
    let saved = save_to_bytes(&mut package);
    let mut reopened = Package::from_bytes(saved).unwrap();
    let entry = reopened.find(key).unwrap();
    assert_eq!(entry.compression_type(), 0x5A42);
    assert!(entry.file_size() != entry.memory_size());
    let id = entry.id();
    assert_eq!(reopened.payload(id).unwrap(), payload.as_slice());
}

#[test]
fn index_count_guard() {
    let mut package = Package::create_new();
    package.add(ResourceKey::new(1, 0, 1), vec![1], true).unwrap();
    package.add(ResourceKey::new(1, 0, 2), vec![2], true).unwrap();
    let bytes = save_to_bytes(&mut package);

    let mut config = PackageConfig::default();
    config.max_resource_count = 1;
    let result = Package::from_bytes_with(bytes, config, &CancelToken::new());
    assert!(matches!(
        result,
        Err(Error::SizeLimitExceeded { kind: "index count", value: 2, limit: 1 })
    ));
}

#[test]
fn index_extent_guard() {
    let mut package = Package::create_new();
    package.add(ResourceKey::new(1, 0, 1), vec![1], true).unwrap();
    let mut bytes = save_to_bytes(&mut package);
    // Claim an index size running past the end of the file.
    let oversized = (bytes.len() as u32).to_le_bytes();
    bytes[44..48].copy_from_slice(&oversized);

    assert!(matches!(
        Package::from_bytes(bytes),
        Err(Error::InvalidFormat { field: "index position", .. })
    ));
}

#[test]
fn cancelled_save_leaves_file_untouched() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cancel.package");

    let mut package = Package::create_new();
    package
        .add(ResourceKey::new(9, 9, 9), b"payload".to_vec(), true)
        .unwrap();
    package.save_as(&path).unwrap();
    let before = std::fs::read(&path).unwrap();

    let mut reopened = Package::open(&path, true).unwrap();
    let id = reopened.find(ResourceKey::new(9, 9, 9)).unwrap().id();
    reopened.replace(id, b"changed".to_vec()).unwrap();

    let token = CancelToken::new();
    token.cancel();
    assert!(matches!(
        reopened.save_cancellable(&token),
        Err(Error::Cancelled)
    ));

    assert_eq!(std::fs::read(&path).unwrap(), before);
    // The temp sibling is rolled back too.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    // The package is still usable after the failed save.
    assert_eq!(reopened.payload(id).unwrap(), b"changed");
}

#[test]
fn busy_writer_fails_before_copy_back() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("busy.package");

    let mut package = Package::create_new();
    package
        .add(ResourceKey::new(7, 7, 7), b"original".to_vec(), true)
        .unwrap();
    package.save_as(&path).unwrap();
    let before = std::fs::read(&path).unwrap();

    let mut writer = Package::open(&path, true).unwrap();
    let id = writer.find(ResourceKey::new(7, 7, 7)).unwrap().id();
    writer.replace(id, b"rewritten".to_vec()).unwrap();

    // A competing holder of the file lock makes the save fail with Busy
    // after the temp file is written but before the copy-back begins;
    // the original must be bit-identical to its pre-save state.
    let contender = std::fs::File::open(&path).unwrap();
    match contender.try_lock() {
        Ok(()) => {
            assert!(matches!(writer.save(), Err(Error::Busy)));
            assert_eq!(std::fs::read(&path).unwrap(), before);
            assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
            let _ = contender.unlock();
        }
        Err(_) => {
            // Filesystem without lock support; the protocol treats that
            // as "proceed without", so there is nothing to contend with.
        }
    }
}

#[test]
fn in_place_save_then_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inplace.package");

    let mut package = Package::create_new();
    package
        .add(ResourceKey::new(3, 0, 1), b"one".to_vec(), true)
        .unwrap();
    package.save_as(&path).unwrap();

    let mut package = Package::open(&path, true).unwrap();
    package
        .add(ResourceKey::new(3, 0, 2), b"two".to_vec(), true)
        .unwrap();
    package.save().unwrap();
    assert!(!package.is_dirty());

    let mut reopened = Package::open_read_only(&path).unwrap();
    assert_eq!(reopened.len(), 2);
    let id = reopened.find(ResourceKey::new(3, 0, 2)).unwrap().id();
    assert_eq!(reopened.payload(id).unwrap(), b"two");
    assert!(matches!(
        reopened.add(ResourceKey::new(3, 0, 3), vec![], true),
        Err(Error::ReadOnly)
    ));
}

#[test]
fn index_invalidated_fires_on_save() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.package");

    let mut package = Package::create_new();
    package.add(ResourceKey::new(1, 1, 1), vec![1], true).unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    package.on_index_invalidated(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    package.save_as(&path).unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    package.save().unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 2);
}
