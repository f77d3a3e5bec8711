//! Configuration for archive stores
//!
//! This module provides the serializable settings used by
//! [`create_store_from_config`](crate::create_store_from_config): compression,
//! version policy, default extension and base directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::compression::{CompressionAdapter, GzipCompressor, NoCompression};
use crate::integrity::{FormatVersion, VersionRequirement, MIN_SUPPORTED_VERSION};
use crate::store::DEFAULT_EXTENSION;
use crate::{PakError, Result};

/// Compression applied to archive payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum CompressionConfig {
    /// Gzip with a level from 0 to 9
    Gzip { level: u32 },
    /// Store the payload uncompressed
    None,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        CompressionConfig::Gzip { level: 6 }
    }
}

/// Configuration structure for archive store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PakConfig {
    pub compression: CompressionConfig,
    /// Oldest format version accepted on load
    pub min_version: FormatVersion,
    /// Skip the version check entirely (digest is still verified)
    pub allow_version_mismatch: bool,
    /// Extension appended to paths without one; `None` disables it
    pub default_extension: Option<String>,
    /// Base directory for relative archive paths
    pub base_dir: Option<PathBuf>,
}

impl PakConfig {
    /// Create a default configuration for local archives
    pub fn default_local() -> Self {
        PakConfig {
            compression: CompressionConfig::default(),
            min_version: MIN_SUPPORTED_VERSION,
            allow_version_mismatch: false,
            default_extension: Some(DEFAULT_EXTENSION.to_string()),
            base_dir: None,
        }
    }

    /// Create a configuration rooted at `base_dir`
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        PakConfig {
            base_dir: Some(base_dir.into()),
            ..Self::default_local()
        }
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PakConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let CompressionConfig::Gzip { level } = self.compression {
            if level > 9 {
                return Err(PakError::validation(format!(
                    "Gzip level must be between 0 and 9, got {level}"
                )));
            }
        }

        if let Some(extension) = &self.default_extension {
            if extension.is_empty() {
                return Err(PakError::validation("Default extension must not be empty"));
            }
            if extension.contains(['.', '/', '\\']) {
                return Err(PakError::validation(format!(
                    "Default extension must not contain separators: {extension:?}"
                )));
            }
        }

        Ok(())
    }

    /// Build the configured compression adapter
    pub fn compressor(&self) -> Box<dyn CompressionAdapter> {
        match self.compression {
            CompressionConfig::Gzip { level } => Box::new(GzipCompressor::with_level(level)),
            CompressionConfig::None => Box::new(NoCompression::new()),
        }
    }

    /// Build the version policy applied on load
    pub fn version_requirement(&self) -> VersionRequirement {
        if self.allow_version_mismatch {
            VersionRequirement::Bypass
        } else {
            VersionRequirement::AtLeast(self.min_version)
        }
    }
}

impl Default for PakConfig {
    fn default() -> Self {
        Self::default_local()
    }
}
