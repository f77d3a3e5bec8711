/*!
# PAK Core

Persistent, auto-vivifying key-value archives.

This crate provides a tree of nested string-keyed mappings that can be saved to
and loaded from a single file, with:

- Dotted-path access (`"a.b.c"`) and automatic creation of intermediate branches
- Culling of empty branches before every save
- SHA-256 integrity digest and format version stamped onto every archive
- Gzip compression and optional password-based AES-256-GCM encryption
- Atomic local file writes

## Architecture

Saving runs `cull → stamp → encode → compress → encrypt → write`; loading runs the
reverse and verifies the digest and version before handing the tree back.
Compression and storage are adapters behind traits, so either can be swapped.

## Usage

```rust
use pak_core::{create_default_store, PakError, Value};

let dir = tempfile::tempdir()?;
let store = create_default_store();
let path = dir.path().join("dev");

store.open(&path, None, true, |pak| {
    pak.set_path("player.inventory.gold", 100)?;
    pak.get_path("never.written")?;
    Ok::<_, PakError>(())
})?;

let pak = store.load(&path, None, false)?;
assert_eq!(pak.lookup_path("player.inventory.gold"), Some(&Value::Int(100)));
assert!(!pak.contains("never"));
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

pub mod codec;
pub mod compression;
pub mod config;
pub mod crypto;
pub mod error;
pub mod integrity;
pub mod node;
pub mod observability;
pub mod path_key;
pub mod storage;
pub mod store;

#[cfg(test)]
mod integrity_tests;

pub use codec::Codec;
pub use compression::{CompressionAdapter, GzipCompressor, NoCompression};
pub use config::{CompressionConfig, PakConfig};
pub use crypto::PasswordCipher;
pub use error::{PakError, Result};
pub use integrity::{FormatVersion, VersionRequirement, FORMAT_VERSION, MIN_SUPPORTED_VERSION};
pub use node::{Node, Snapshot, Value, MAX_DEPTH};
pub use storage::{LocalFileStorage, StorageAdapter};
pub use store::{create_default_store, create_store_from_config, ArchiveStore, DEFAULT_EXTENSION};
