/*!
Integrity envelope: content digest and format version stamped onto every saved snapshot.
*/

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::node::Snapshot;
use crate::{PakError, Result};

/// Format version written by this build
pub const FORMAT_VERSION: FormatVersion = FormatVersion::new(1, 0, 0);

/// Oldest format version this build accepts by default
pub const MIN_SUPPORTED_VERSION: FormatVersion = FormatVersion::new(1, 0, 0);

/// Three-component archive format version, serialized as a `(major, minor, patch)` tuple
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(from = "(u32, u32, u32)", into = "(u32, u32, u32)")]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FormatVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// True if every component is at least the corresponding component of `required`
    pub fn is_compatible_with(&self, required: &FormatVersion) -> bool {
        self.major >= required.major && self.minor >= required.minor && self.patch >= required.patch
    }
}

impl From<(u32, u32, u32)> for FormatVersion {
    fn from((major, minor, patch): (u32, u32, u32)) -> Self {
        Self::new(major, minor, patch)
    }
}

impl From<FormatVersion> for (u32, u32, u32) {
    fn from(version: FormatVersion) -> Self {
        (version.major, version.minor, version.patch)
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// How strictly the stored format version is checked on load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRequirement {
    /// Stored version must be component-wise at least this version
    AtLeast(FormatVersion),
    /// Skip the version check entirely. Unsafe: the data may not decode as expected.
    Bypass,
}

impl Default for VersionRequirement {
    fn default() -> Self {
        Self::AtLeast(MIN_SUPPORTED_VERSION)
    }
}

/// A snapshot together with its integrity metadata.
///
/// The metadata lives beside the user mapping rather than inside it, under
/// reserved names, so it can never collide with a user key.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StampedSnapshot {
    /// SHA-256 of the canonical rendering of `state`
    #[serde(rename = "__pak_digest__")]
    pub digest: String,

    /// Format version the snapshot was written with
    #[serde(rename = "__pak_version__")]
    pub version: FormatVersion,

    /// When the archive was first saved; carried over unchanged by later saves.
    /// Not covered by the digest.
    #[serde(rename = "__pak_created_at__")]
    pub created_at: DateTime<Utc>,

    /// When the snapshot was stamped. Not covered by the digest.
    #[serde(rename = "__pak_saved_at__")]
    pub saved_at: DateTime<Utc>,

    pub state: Snapshot,
}

/// Compute SHA-256 of the provided data as a lowercase hex string
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Canonical byte rendering of a snapshot: its binary encoding.
///
/// Keys are ordered and every value carries its kind tag, so equal snapshots
/// always render identically and a branch never hashes like a plain map leaf.
pub fn canonical_bytes(snapshot: &Snapshot) -> Result<Vec<u8>> {
    Ok(bincode::serialize(snapshot)?)
}

/// Deterministic digest of a snapshot
pub fn compute_digest(snapshot: &Snapshot) -> Result<String> {
    Ok(hash_bytes(&canonical_bytes(snapshot)?))
}

/// Attach a fresh digest and the given format version to a snapshot
///
/// `created_at` is the creation time of a previously loaded archive; `None`
/// marks a first save and uses the current time.
pub fn stamp(
    snapshot: Snapshot,
    version: FormatVersion,
    created_at: Option<DateTime<Utc>>,
) -> Result<StampedSnapshot> {
    let saved_at = Utc::now();
    Ok(StampedSnapshot {
        digest: compute_digest(&snapshot)?,
        version,
        created_at: created_at.unwrap_or(saved_at),
        saved_at,
        state: snapshot,
    })
}

/// Check a stamped snapshot and strip its metadata.
///
/// # Errors
/// * `PakError::IntegrityCheckFailed` - the recomputed digest differs from the stored one
/// * `PakError::IncompatibleVersion` - the stored version is below the requirement
pub fn verify(stamped: StampedSnapshot, requirement: &VersionRequirement) -> Result<Snapshot> {
    let actual = compute_digest(&stamped.state)?;
    if actual != stamped.digest {
        warn!(expected = %stamped.digest, actual = %actual, "Archive digest mismatch");
        return Err(PakError::IntegrityCheckFailed {
            expected: stamped.digest,
            actual,
        });
    }

    match requirement {
        VersionRequirement::AtLeast(required) if !stamped.version.is_compatible_with(required) => {
            Err(PakError::IncompatibleVersion {
                stored: stamped.version,
                required: *required,
            })
        }
        VersionRequirement::Bypass => {
            warn!(stored = %stamped.version, "Archive version check bypassed");
            Ok(stamped.state)
        }
        VersionRequirement::AtLeast(_) => Ok(stamped.state),
    }
}
