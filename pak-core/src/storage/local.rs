/*!
Local filesystem storage adapter implementation.
*/

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::StorageAdapter;
use crate::{PakError, Result};

/// Local filesystem storage adapter
///
/// This implementation stores archives as files on the local filesystem.
/// It automatically creates parent directories if they don't exist, and writes
/// through a temporary file in the target directory that is renamed into place,
/// so a crash mid-write never leaves a half-written archive behind.
///
/// Replacing an archive keeps the permissions of the file it replaces. A new
/// archive is created readable by its owner only (mode 0600 on Unix).
///
/// # Example
/// ```rust
/// use pak_core::storage::{LocalFileStorage, StorageAdapter};
///
/// let dir = tempfile::tempdir()?;
/// let storage = LocalFileStorage::with_base_dir(dir.path());
/// storage.save(b"archive bytes", "saves/slot1.pak".as_ref())?;
/// assert!(storage.exists("saves/slot1.pak".as_ref()));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct LocalFileStorage {
    /// Optional base directory for all archives
    base_dir: Option<PathBuf>,
}

impl LocalFileStorage {
    /// Create a new local file storage adapter without a base directory
    ///
    /// Paths provided to save/load will be used as-is.
    pub fn new() -> Self {
        Self { base_dir: None }
    }

    /// Create a new local file storage adapter with a base directory
    ///
    /// All relative paths will be resolved against the base directory.
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: Some(base_dir.as_ref().to_path_buf()),
        }
    }

    /// Resolve the full path for a given storage path
    fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        }
    }

    /// Ensure the parent directory exists, creating it if necessary
    fn ensure_parent_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    PakError::storage(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        Ok(())
    }
}

impl StorageAdapter for LocalFileStorage {
    fn save(&self, data: &[u8], path: &Path) -> Result<()> {
        let full_path = self.resolve_path(path);

        self.ensure_parent_dir(&full_path)?;

        let dir = match full_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| {
            PakError::storage(format!(
                "Failed to create temporary file in {}: {}",
                dir.display(),
                e
            ))
        })?;
        if let Ok(existing) = fs::metadata(&full_path) {
            temp.as_file()
                .set_permissions(existing.permissions())
                .map_err(|e| {
                    PakError::storage(format!(
                        "Failed to carry permissions over to {}: {}",
                        full_path.display(),
                        e
                    ))
                })?;
        }
        temp.write_all(data)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| {
                PakError::storage(format!(
                    "Failed to write archive to {}: {}",
                    full_path.display(),
                    e
                ))
            })?;
        temp.persist(&full_path).map_err(|e| {
            PakError::storage(format!(
                "Failed to move archive into place at {}: {}",
                full_path.display(),
                e
            ))
        })?;

        debug!(path = %full_path.display(), bytes = data.len(), "Wrote archive");
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<Vec<u8>> {
        let full_path = self.resolve_path(path);

        fs::read(&full_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PakError::FileNotFound(full_path.clone()),
            _ => PakError::storage(format!(
                "Failed to read archive from {}: {}",
                full_path.display(),
                e
            )),
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve_path(path).is_file()
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let full_path = self.resolve_path(path);

        fs::remove_file(&full_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PakError::FileNotFound(full_path.clone()),
            _ => PakError::storage(format!(
                "Failed to delete archive {}: {}",
                full_path.display(),
                e
            )),
        })?;

        debug!(path = %full_path.display(), "Deleted archive");
        Ok(())
    }
}
