/*!
File-level archive lifecycle: load, save, scoped open and delete.

This module orchestrates the codec and the storage adapter. It owns path
handling (including the default `.pak` extension) and the rule that a scoped
[`ArchiveStore::open`] only writes back when the caller's closure succeeds.
*/

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{
    codec::Codec,
    compression::{CompressionAdapter, GzipCompressor},
    config::PakConfig,
    storage::{LocalFileStorage, StorageAdapter},
    Node, PakError, Result,
};

/// Extension appended to archive paths that have none
pub const DEFAULT_EXTENSION: &str = "pak";

/// Main entry point for persisting archives
///
/// # Example
/// ```rust
/// use pak_core::{ArchiveStore, Codec, GzipCompressor, LocalFileStorage, Value};
///
/// let dir = tempfile::tempdir()?;
/// let store = ArchiveStore::new(
///     LocalFileStorage::with_base_dir(dir.path()),
///     Codec::new(GzipCompressor::new()),
/// );
///
/// store.open("saves/dev", None, true, |pak| pak.set_path("player.level", 2))?;
///
/// let pak = store.load("saves/dev", None, false)?;
/// assert_eq!(pak.lookup_path("player.level"), Some(&Value::Int(2)));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct ArchiveStore<S, C>
where
    S: StorageAdapter,
    C: CompressionAdapter,
{
    storage: S,
    codec: Codec<C>,
    default_extension: Option<String>,
}

impl<S, C> ArchiveStore<S, C>
where
    S: StorageAdapter,
    C: CompressionAdapter,
{
    /// Create a new store with the given storage adapter and codec
    pub fn new(storage: S, codec: Codec<C>) -> Self {
        Self {
            storage,
            codec,
            default_extension: Some(DEFAULT_EXTENSION.to_string()),
        }
    }

    /// Use `extension` for paths that have none, or leave such paths alone with `None`
    pub fn with_default_extension(mut self, extension: Option<String>) -> Self {
        self.default_extension = extension;
        self
    }

    pub fn codec(&self) -> &Codec<C> {
        &self.codec
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Apply the default extension to a path without one
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.default_extension {
            Some(extension) if path.extension().is_none() => path.with_extension(extension),
            _ => path.to_path_buf(),
        }
    }

    /// Load an archive.
    ///
    /// Runs decrypt → decompress → decode, verifying digest and version.
    ///
    /// # Arguments
    /// * `path` - Archive location; the default extension is added if it has none
    /// * `password` - Password for encrypted archives
    /// * `create_if_missing` - Return an empty tree instead of failing when the file is absent
    ///
    /// # Errors
    /// * `PakError::FileNotFound` - absent file and `create_if_missing` is false
    /// * any error from [`Codec::open_bytes`]
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        password: Option<&str>,
        create_if_missing: bool,
    ) -> Result<Node> {
        let path = self.resolve_path(path.as_ref());
        observe("load", || {
            let bytes = match self.storage.load(&path) {
                Ok(bytes) => bytes,
                Err(PakError::FileNotFound(_)) if create_if_missing => {
                    info!(path = %path.display(), "Archive not found, starting empty");
                    return Ok(Node::new());
                }
                Err(e) => return Err(e),
            };

            #[cfg(feature = "metrics")]
            crate::observability::record_archive_size(bytes.len());

            let node = self.codec.open_bytes(&bytes, password).map_err(|e| {
                warn!(path = %path.display(), error = %e, "Failed to load archive");
                e
            })?;
            info!(
                path = %path.display(),
                keys = node.len(),
                encrypted = password.is_some(),
                "Loaded archive"
            );
            Ok(node)
        })
    }

    /// Save an archive.
    ///
    /// The tree is culled as part of encoding. The write is atomic: on failure
    /// the previous file content is left untouched.
    pub fn save(&self, node: &mut Node, path: impl AsRef<Path>, password: Option<&str>) -> Result<()> {
        let path = self.resolve_path(path.as_ref());
        observe("save", || {
            let bytes = self.codec.seal(node, password)?;

            #[cfg(feature = "metrics")]
            crate::observability::record_archive_size(bytes.len());

            self.storage.save(&bytes, &path)?;
            info!(
                path = %path.display(),
                bytes = bytes.len(),
                compression = self.codec.compressor().algorithm_name(),
                encrypted = password.is_some(),
                "Saved archive"
            );
            Ok(())
        })
    }

    /// Load (or create) an archive, hand it to `scope`, and save it if `scope` succeeds.
    ///
    /// When `scope` returns an error the archive is not written, so a failed
    /// operation never persists partially applied mutations.
    ///
    /// # Example
    /// ```rust
    /// use pak_core::{create_default_store, PakError};
    ///
    /// let dir = tempfile::tempdir()?;
    /// let store = create_default_store();
    /// let path = dir.path().join("slot1");
    ///
    /// let gold = store.open(&path, None, true, |pak| {
    ///     pak.set_path("inventory.gold", 100)?;
    ///     Ok::<_, PakError>(100)
    /// })?;
    /// assert_eq!(gold, 100);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open<T, E, F>(
        &self,
        path: impl AsRef<Path>,
        password: Option<&str>,
        create_if_missing: bool,
        scope: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Node) -> std::result::Result<T, E>,
        E: From<PakError>,
    {
        let path = self.resolve_path(path.as_ref());
        let mut node = self.load(&path, password, create_if_missing)?;

        match scope(&mut node) {
            Ok(value) => {
                self.save(&mut node, &path, password)?;
                Ok(value)
            }
            Err(e) => {
                warn!(path = %path.display(), "Archive scope failed, changes discarded");
                Err(e)
            }
        }
    }

    /// Delete an archive file.
    ///
    /// # Errors
    /// `PakError::FileNotFound` if the archive does not exist
    pub fn delete(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = self.resolve_path(path.as_ref());
        self.storage.delete(&path)?;
        info!(path = %path.display(), "Deleted archive");
        Ok(())
    }

    /// Check whether an archive file exists
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.storage.exists(&self.resolve_path(path.as_ref()))
    }

    /// Fully load an archive to check it, discarding the result
    pub fn verify(&self, path: impl AsRef<Path>, password: Option<&str>) -> Result<()> {
        let _ = self.load(path, password, false)?;
        Ok(())
    }
}

#[cfg(feature = "metrics")]
fn observe<T>(operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let timer = crate::observability::MetricsTimer::new(operation);
    let result = f();
    match &result {
        Ok(_) => timer.finish(),
        Err(_) => timer.finish_with_error(),
    }
    result
}

#[cfg(not(feature = "metrics"))]
fn observe<T>(operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    debug!(operation, "Archive operation started");
    f()
}

/// Convenience function to create a store with default components
///
/// Creates a store with:
/// - Local file storage (no base directory)
/// - Gzip compression with default level
/// - Current format version and default minimum version
pub fn create_default_store() -> ArchiveStore<LocalFileStorage, GzipCompressor> {
    ArchiveStore::new(LocalFileStorage::new(), Codec::new(GzipCompressor::new()))
}

/// Create a store from configuration
///
/// # Example
/// ```rust
/// use pak_core::{create_store_from_config, PakConfig};
///
/// let config = PakConfig::from_json_str(r#"{"compression": {"algorithm": "none"}}"#)?;
/// let store = create_store_from_config(&config)?;
/// assert_eq!(store.codec().compressor().algorithm_name(), "none");
/// # Ok::<(), pak_core::PakError>(())
/// ```
pub fn create_store_from_config(
    config: &PakConfig,
) -> Result<ArchiveStore<LocalFileStorage, Box<dyn CompressionAdapter>>> {
    config.validate()?;

    let storage = match &config.base_dir {
        Some(base_dir) => LocalFileStorage::with_base_dir(base_dir),
        None => LocalFileStorage::new(),
    };
    let codec = Codec::new(config.compressor()).with_requirement(config.version_requirement());

    debug!(?config, "Creating archive store from config");
    Ok(ArchiveStore::new(storage, codec).with_default_extension(config.default_extension.clone()))
}
