/*!
Error types for the PAK core engine.
*/

use std::path::PathBuf;

use thiserror::Error;

use crate::integrity::FormatVersion;

/// Result type used throughout the PAK core.
pub type Result<T> = std::result::Result<T, PakError>;

/// Errors that can occur while manipulating or persisting archives.
#[derive(Error, Debug)]
pub enum PakError {
    /// The archive file does not exist and creation was not requested
    #[error("Archive not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Digest of the stored state does not match the recomputed digest
    #[error("Integrity check failed: expected hash {expected}, got {actual}")]
    IntegrityCheckFailed { expected: String, actual: String },

    /// Stored format version is older than the reader requires
    #[error("Incompatible archive version: stored {stored}, required at least {required}")]
    IncompatibleVersion {
        stored: FormatVersion,
        required: FormatVersion,
    },

    /// Decryption failed (wrong password or tampered ciphertext)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The archive is encrypted but no password was supplied
    #[error("Archive is encrypted and no password was supplied")]
    PasswordRequired,

    /// Deleting a key or path that does not exist
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Value cannot be represented by the archive encoding
    #[error("Value for '{0}' is not serializable")]
    NotSerializable(String),

    /// A path segment that must be a branch holds a leaf value
    #[error("Path conflict: '{0}' holds a leaf value, not a branch")]
    PathConflict(String),

    /// Invalid archive format
    #[error("Invalid archive format: {0}")]
    InvalidFormat(String),

    /// Compression/decompression errors
    #[error("Compression error: {0}")]
    Compression(String),

    /// Storage adapter errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors (canonical digest form, config)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary encoding/decoding errors
    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

impl PakError {
    /// Create a new compression error
    pub fn compression<S: Into<String>>(msg: S) -> Self {
        Self::Compression(msg.into())
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new invalid format error
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Create a new authentication error
    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Self::AuthenticationFailed(msg.into())
    }
}
