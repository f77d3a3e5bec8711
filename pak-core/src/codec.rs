/*!
Byte-level pipeline between an archive tree and the bytes stored on disk.

Saving runs encode → compress → encrypt; loading runs the exact inverse. Each
layer is recognised by its leading magic bytes, so archives stay self-describing:

```text
[ "PAKX" | version | nonce | AES-256-GCM( ... ) ]     only with a password
    [ 1f 8b ... gzip stream ( ... ) ]                  only with compression
        [ "PAK\x01" | bincode(StampedSnapshot) ]
```
*/

use std::borrow::Cow;

use tracing::debug;

use crate::{
    compression::{CompressionAdapter, GzipCompressor},
    crypto::PasswordCipher,
    integrity::{self, FormatVersion, StampedSnapshot, VersionRequirement, FORMAT_VERSION},
    Node, PakError, Result,
};

/// Leading bytes of an encoded (uncompressed, unencrypted) payload
pub const PAYLOAD_MAGIC: [u8; 4] = *b"PAK\x01";

/// Encoder/decoder for archive trees
///
/// The compression strategy is supplied at construction; the cipher is derived
/// per call from the password, and no password means no encryption.
///
/// # Example
/// ```rust
/// use pak_core::{Codec, GzipCompressor, Node};
///
/// let codec = Codec::new(GzipCompressor::new());
/// let mut pak = Node::new();
/// pak.set_path("player.level", 3)?;
///
/// let bytes = codec.seal(&mut pak, Some("secret"))?;
/// let restored = codec.open_bytes(&bytes, Some("secret"))?;
/// assert_eq!(restored, pak);
/// # Ok::<(), pak_core::PakError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Codec<C: CompressionAdapter = GzipCompressor> {
    compressor: C,
    version: FormatVersion,
    requirement: VersionRequirement,
}

impl<C: CompressionAdapter> Codec<C> {
    /// Create a codec writing the current format version and enforcing the default minimum
    pub fn new(compressor: C) -> Self {
        Self {
            compressor,
            version: FORMAT_VERSION,
            requirement: VersionRequirement::default(),
        }
    }

    /// Stamp saved archives with a different format version
    pub fn with_version(mut self, version: FormatVersion) -> Self {
        self.version = version;
        self
    }

    /// Change how stored versions are checked on load
    pub fn with_requirement(mut self, requirement: VersionRequirement) -> Self {
        self.requirement = requirement;
        self
    }

    pub fn compressor(&self) -> &C {
        &self.compressor
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    pub fn requirement(&self) -> &VersionRequirement {
        &self.requirement
    }

    /// Cull the tree, stamp its snapshot and binary-encode it.
    ///
    /// The tree is validated again first, since values reached through
    /// [`Node::get_path`] may have been overwritten in place. A tree loaded from
    /// an archive keeps that archive's creation time.
    ///
    /// The returned bytes are neither compressed nor encrypted.
    ///
    /// # Errors
    /// `PakError::NotSerializable` when a value is non-finite or nested too deep.
    pub fn encode(&self, node: &mut Node) -> Result<Vec<u8>> {
        node.cull().validate()?;
        let stamped = integrity::stamp(node.to_snapshot(), self.version, node.created_at())?;
        node.set_created_at(stamped.created_at);

        let mut payload = PAYLOAD_MAGIC.to_vec();
        bincode::serialize_into(&mut payload, &stamped)?;

        debug!(
            keys = stamped.state.len(),
            bytes = payload.len(),
            digest = %stamped.digest,
            "Encoded archive"
        );
        Ok(payload)
    }

    /// Decode, verify and rebuild a tree from [`Codec::encode`] output.
    ///
    /// # Errors
    /// * `PakError::InvalidFormat` - the payload magic is missing
    /// * `PakError::Encoding` - the payload cannot be decoded or nests deeper than [`crate::MAX_DEPTH`]
    /// * `PakError::IntegrityCheckFailed` - the digest does not match
    /// * `PakError::IncompatibleVersion` - the stored version is too old
    pub fn decode(&self, bytes: &[u8]) -> Result<Node> {
        let body = bytes
            .strip_prefix(&PAYLOAD_MAGIC[..])
            .ok_or_else(|| PakError::invalid_format("Missing archive payload header"))?;

        let stamped: StampedSnapshot = bincode::deserialize(body)?;
        debug!(
            version = %stamped.version,
            created_at = %stamped.created_at,
            saved_at = %stamped.saved_at,
            "Decoded archive payload"
        );

        let created_at = stamped.created_at;
        let snapshot = integrity::verify(stamped, &self.requirement)?;
        let mut node = Node::from_snapshot(snapshot);
        node.set_created_at(created_at);
        Ok(node)
    }

    /// Compress with the configured strategy
    pub fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        self.compressor.compress(bytes)
    }

    /// Decompress if, and only if, the bytes carry a known compression magic
    pub fn decompress<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        if self.compressor.detect(bytes) {
            Ok(Cow::Owned(self.compressor.decompress(bytes)?))
        } else if GzipCompressor::sniff(bytes) {
            Ok(Cow::Owned(GzipCompressor::new().decompress(bytes)?))
        } else {
            Ok(Cow::Borrowed(bytes))
        }
    }

    /// Encrypt with a key derived from `password`
    pub fn encrypt(&self, bytes: &[u8], password: &str) -> Result<Vec<u8>> {
        PasswordCipher::from_password(password).encrypt(bytes)
    }

    /// Decrypt with a key derived from `password`
    pub fn decrypt(&self, bytes: &[u8], password: &str) -> Result<Vec<u8>> {
        PasswordCipher::from_password(password).decrypt(bytes)
    }

    /// Run the full save pipeline: encode → compress → encrypt (if a password is given)
    pub fn seal(&self, node: &mut Node, password: Option<&str>) -> Result<Vec<u8>> {
        let encoded = self.encode(node)?;
        let compressed = self.compress(&encoded)?;
        match password {
            Some(password) => self.encrypt(&compressed, password),
            None => Ok(compressed),
        }
    }

    /// Run the full load pipeline: decrypt → decompress → decode
    ///
    /// # Errors
    /// * `PakError::PasswordRequired` - the bytes are encrypted and no password was given
    /// * `PakError::AuthenticationFailed` - wrong password, tampered ciphertext, or a
    ///   password given for an unencrypted archive
    pub fn open_bytes(&self, bytes: &[u8], password: Option<&str>) -> Result<Node> {
        let plain: Cow<'_, [u8]> = match (PasswordCipher::is_encrypted(bytes), password) {
            (true, Some(password)) => Cow::Owned(self.decrypt(bytes, password)?),
            (true, None) => return Err(PakError::PasswordRequired),
            (false, Some(_)) => {
                return Err(PakError::authentication(
                    "a password was supplied but the archive is not encrypted",
                ))
            }
            (false, None) => Cow::Borrowed(bytes),
        };

        let payload = self.decompress(&plain)?;
        self.decode(&payload)
    }
}

impl Default for Codec<GzipCompressor> {
    fn default() -> Self {
        Self::new(GzipCompressor::new())
    }
}
