/*!
End-to-end integration tests for PAK archives.
These tests exercise the complete pipeline from the tree API through to files on disk.
*/

use std::collections::BTreeMap;
use std::fs;

use pak_core::{
    create_default_store, create_store_from_config, ArchiveStore, Codec, CompressionConfig,
    FormatVersion, GzipCompressor, LocalFileStorage, NoCompression, Node, PakConfig, PakError,
    Value,
};
use tempfile::TempDir;

fn plain_store(dir: &TempDir) -> ArchiveStore<LocalFileStorage, NoCompression> {
    ArchiveStore::new(
        LocalFileStorage::with_base_dir(dir.path()),
        Codec::new(NoCompression::new()),
    )
}

#[test]
fn test_complete_archive_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_default_store();
    let path = temp_dir.path().join("saves").join("dev");

    // Phase 1: create and populate
    store
        .open(&path, None, true, |pak| {
            pak.set_path("player.name", "ada")?;
            pak.set_path("player.inventory.gold", 100)?;
            pak.set_path("player.inventory.items", vec!["sword", "lamp"])?;
            pak.set_path("world.seed", 42)?;
            pak.set("raw", Value::Bytes(vec![0, 1, 2, 255]))?;
            // read-only lookups leave empty branches that must not be persisted
            pak.get_path("settings.audio.volume")?;
            Ok::<_, PakError>(())
        })
        .unwrap();

    let file = temp_dir.path().join("saves").join("dev.pak");
    assert!(file.exists());

    // Phase 2: reload and mutate
    store
        .open(&path, None, false, |pak| {
            assert!(!pak.contains("settings"));
            *pak.get_path("player.inventory.gold")? = Value::Int(250);
            pak.delete_path("world.seed")?;
            Ok::<_, PakError>(())
        })
        .unwrap();

    // Phase 3: verify final state
    let pak = store.load(&path, None, false).unwrap();
    assert_eq!(pak.lookup_path("player.inventory.gold"), Some(&Value::Int(250)));
    assert_eq!(pak.lookup_path("player.name"), Some(&Value::Text("ada".to_string())));
    assert_eq!(pak.lookup("raw"), Some(&Value::Bytes(vec![0, 1, 2, 255])));
    assert!(!pak.contains("world"));

    // Phase 4: delete
    store.delete(&path).unwrap();
    assert!(!file.exists());
    assert!(matches!(
        store.load(&path, None, false),
        Err(PakError::FileNotFound(_))
    ));
}

#[test]
fn test_loaded_tree_equals_culled_tree() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_default_store();
    let path = temp_dir.path().join("state.pak");

    let mut pak = Node::new();
    pak.set_path("a.b.c", 1).unwrap();
    pak.set_path("a.b.d", 2.5).unwrap();
    pak.get_path("a.e.f").unwrap();
    pak.set("list", vec![Value::Null, Value::Bool(true)]).unwrap();

    store.save(&mut pak, &path, None).unwrap();
    // save culled the caller's tree in place
    assert!(!pak.contains_path("a.e"));

    let loaded = store.load(&path, None, false).unwrap();
    assert_eq!(loaded, pak);
}

#[test]
fn test_saved_file_is_gzip() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_default_store();
    let path = temp_dir.path().join("compressed.pak");

    let mut pak = Node::new();
    pak.set("text", "repeated ".repeat(200)).unwrap();
    store.save(&mut pak, &path, None).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
    assert!(bytes.len() < 1800);
}

#[test]
fn test_tampered_file_fails_integrity() {
    let temp_dir = TempDir::new().unwrap();
    let store = plain_store(&temp_dir);

    let mut pak = Node::new();
    pak.set("greeting", "hello").unwrap();
    store.save(&mut pak, "tamper", None).unwrap();

    let file = temp_dir.path().join("tamper.pak");
    let mut bytes = fs::read(&file).unwrap();
    let offset = bytes
        .windows(5)
        .position(|w| w == b"hello")
        .expect("leaf text is stored verbatim without compression");
    bytes[offset] = b'j';
    fs::write(&file, &bytes).unwrap();

    assert!(matches!(
        store.load("tamper", None, false),
        Err(PakError::IntegrityCheckFailed { .. })
    ));
}

#[test]
fn test_password_protected_archive() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_default_store();
    let path = temp_dir.path().join("vault");

    store
        .open(&path, Some("secret"), true, |pak| pak.set_path("a.b.c", 2))
        .unwrap();

    let bytes = fs::read(temp_dir.path().join("vault.pak")).unwrap();
    assert_eq!(&bytes[..4], b"PAKX");

    assert!(matches!(
        store.load(&path, Some("wrong"), false),
        Err(PakError::AuthenticationFailed(_))
    ));
    assert!(matches!(
        store.load(&path, None, false),
        Err(PakError::PasswordRequired)
    ));

    let pak = store.load(&path, Some("secret"), false).unwrap();
    assert_eq!(pak.lookup_path("a.b.c"), Some(&Value::Int(2)));
}

#[test]
fn test_failed_scope_leaves_file_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_default_store();
    let path = temp_dir.path().join("slot");

    store.open(&path, None, true, |pak| pak.set("hp", 10)).unwrap();
    let before = fs::read(temp_dir.path().join("slot.pak")).unwrap();

    let result = store.open(&path, None, false, |pak| {
        pak.set("hp", 0)?;
        pak.delete("missing")?;
        Ok::<_, PakError>(())
    });
    assert!(matches!(result, Err(PakError::KeyNotFound(_))));

    let after = fs::read(temp_dir.path().join("slot.pak")).unwrap();
    assert_eq!(before, after);
    let pak = store.load(&path, None, false).unwrap();
    assert_eq!(pak.lookup("hp"), Some(&Value::Int(10)));
}

#[test]
fn test_compressed_and_plain_archives_are_interchangeable() {
    let temp_dir = TempDir::new().unwrap();
    let gzip_store = ArchiveStore::new(
        LocalFileStorage::with_base_dir(temp_dir.path()),
        Codec::new(GzipCompressor::max()),
    );
    let plain = plain_store(&temp_dir);

    let mut pak = Node::new();
    pak.set_path("k.v", "x").unwrap();

    gzip_store.save(&mut pak, "a", None).unwrap();
    plain.save(&mut pak, "b", None).unwrap();

    assert_eq!(plain.load("a", None, false).unwrap(), pak);
    assert_eq!(gzip_store.load("b", None, false).unwrap(), pak);
}

#[test]
fn test_archive_below_minimum_version_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let old_writer = ArchiveStore::new(
        LocalFileStorage::with_base_dir(temp_dir.path()),
        Codec::new(GzipCompressor::new()).with_version(FormatVersion::new(0, 9, 0)),
    );
    old_writer
        .open("legacy", None, true, |pak| pak.set("k", 1))
        .unwrap();

    let store = create_store_from_config(&PakConfig::with_base_dir(temp_dir.path())).unwrap();
    assert!(matches!(
        store.load("legacy", None, false),
        Err(PakError::IncompatibleVersion { .. })
    ));
    assert!(store.verify("legacy", None).is_err());

    let lenient = create_store_from_config(&PakConfig {
        allow_version_mismatch: true,
        ..PakConfig::with_base_dir(temp_dir.path())
    })
    .unwrap();
    assert!(lenient.verify("legacy", None).is_ok());
}

#[test]
fn test_store_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = PakConfig {
        compression: CompressionConfig::None,
        default_extension: Some("sav".to_string()),
        ..PakConfig::with_base_dir(temp_dir.path())
    };
    let store = create_store_from_config(&config).unwrap();

    store.open("slot", None, true, |pak| pak.set("k", 1)).unwrap();
    assert!(temp_dir.path().join("slot.sav").exists());
    assert!(store.exists("slot"));

    let bytes = fs::read(temp_dir.path().join("slot.sav")).unwrap();
    assert_eq!(&bytes[..4], b"PAK\x01");
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = PakConfig {
        compression: CompressionConfig::Gzip { level: 42 },
        ..PakConfig::default_local()
    };
    assert!(matches!(
        create_store_from_config(&config),
        Err(PakError::Validation(_))
    ));
}

#[test]
fn test_empty_tree_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_default_store();
    let path = temp_dir.path().join("empty");

    store.open(&path, None, true, |_| Ok::<_, PakError>(())).unwrap();

    let pak = store.load(&path, None, false).unwrap();
    assert!(pak.is_empty());
    assert_eq!(pak, BTreeMap::<String, Value>::new());
}

#[test]
fn test_garbage_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let store = plain_store(&temp_dir);
    fs::write(temp_dir.path().join("junk.pak"), b"definitely not an archive").unwrap();

    assert!(matches!(
        store.load("junk", None, false),
        Err(PakError::InvalidFormat(_))
    ));
}
