/*!
Storage adapters for archive bytes.

This module defines the storage abstraction (port) and its filesystem adapter. The
codec and store only ever need to read, write, check for and remove a whole file.
*/

pub mod local;

use std::path::Path;

use crate::Result;

/// Storage abstraction for saving and loading archive bytes
///
/// This trait defines the interface that all storage implementations must provide.
/// It abstracts away the specifics of where and how data is stored, allowing
/// the store to work with any backend.
pub trait StorageAdapter {
    /// Save archive data to the specified location, replacing any previous content
    ///
    /// Implementations must either write everything or leave the previous
    /// content untouched.
    fn save(&self, data: &[u8], path: &Path) -> Result<()>;

    /// Load archive data from the specified location
    ///
    /// # Errors
    /// `PakError::FileNotFound` if nothing is stored at `path`
    fn load(&self, path: &Path) -> Result<Vec<u8>>;

    /// Check if an archive exists at the specified location
    fn exists(&self, path: &Path) -> bool;

    /// Delete an archive from the specified location
    ///
    /// # Errors
    /// `PakError::FileNotFound` if nothing is stored at `path`
    fn delete(&self, path: &Path) -> Result<()>;
}

// Re-export types for convenience
pub use local::LocalFileStorage;

/// Memory-based storage adapter for testing
///
/// This implementation stores archives in memory using a HashMap.
/// Useful for unit testing without touching the filesystem.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStorage {
    data: std::sync::Mutex<std::collections::HashMap<std::path::PathBuf, Vec<u8>>>,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite stored bytes directly, bypassing the codec
    pub fn put_raw(&self, path: &Path, data: Vec<u8>) {
        self.data.lock().unwrap().insert(path.to_path_buf(), data);
    }
}

#[cfg(test)]
impl StorageAdapter for MemoryStorage {
    fn save(&self, data: &[u8], path: &Path) -> Result<()> {
        let mut storage = self.data.lock().unwrap();
        storage.insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<Vec<u8>> {
        let storage = self.data.lock().unwrap();
        storage
            .get(path)
            .cloned()
            .ok_or_else(|| crate::PakError::FileNotFound(path.to_path_buf()))
    }

    fn exists(&self, path: &Path) -> bool {
        let storage = self.data.lock().unwrap();
        storage.contains_key(path)
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let mut storage = self.data.lock().unwrap();
        storage
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| crate::PakError::FileNotFound(path.to_path_buf()))
    }
}
