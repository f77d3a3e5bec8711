//! Password-based authenticated encryption for archive payloads.
//!
//! Uses AES-256-GCM keyed by the SHA-256 digest of the password.
//!
//! # Wire Format
//!
//! ```text
//! [4 bytes "PAKX"][1 byte version][12 bytes nonce][N bytes ciphertext][16 bytes auth tag]
//! ```
//!
//! The magic and version bytes are bound to the ciphertext as associated data.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use sha2::{Digest, Sha256};

use crate::{PakError, Result};

/// Leading bytes of every encrypted archive
pub const ENCRYPTION_MAGIC: [u8; 4] = *b"PAKX";

/// Current encryption envelope version.
const ENCRYPTION_VERSION: u8 = 1;

/// Size of the nonce in bytes (96 bits for GCM).
const NONCE_SIZE: usize = 12;

/// Size of the authentication tag in bytes.
const TAG_SIZE: usize = 16;

const HEADER_SIZE: usize = ENCRYPTION_MAGIC.len() + 1;

/// Symmetric cipher derived from a password.
#[derive(Clone)]
pub struct PasswordCipher {
    key: [u8; 32],
}

impl PasswordCipher {
    /// Derive the cipher key from a password
    pub fn from_password(password: &str) -> Self {
        let digest = Sha256::digest(password.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Whether `data` carries the encryption envelope
    pub fn is_encrypted(data: &[u8]) -> bool {
        data.starts_with(&ENCRYPTION_MAGIC)
    }

    fn header() -> [u8; HEADER_SIZE] {
        let mut header = [0u8; HEADER_SIZE];
        header[..ENCRYPTION_MAGIC.len()].copy_from_slice(&ENCRYPTION_MAGIC);
        header[ENCRYPTION_MAGIC.len()] = ENCRYPTION_VERSION;
        header
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| PakError::authentication(format!("Invalid key: {e}")))
    }

    /// Encrypt `plaintext` with a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = self.cipher()?;
        let header = Self::header();

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad: &header,
                },
            )
            .map_err(|e| PakError::authentication(format!("Encryption failed: {e}")))?;

        let mut result = Vec::with_capacity(HEADER_SIZE + NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&header);
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypt an envelope produced by [`PasswordCipher::encrypt`].
    ///
    /// # Errors
    /// * `PakError::InvalidFormat` - the envelope is truncated or of an unknown version
    /// * `PakError::AuthenticationFailed` - wrong password or tampered ciphertext
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if !Self::is_encrypted(data) {
            return Err(PakError::invalid_format("Missing encryption header"));
        }
        if data.len() < HEADER_SIZE + NONCE_SIZE + TAG_SIZE {
            return Err(PakError::invalid_format("Encrypted payload is truncated"));
        }

        let version = data[ENCRYPTION_MAGIC.len()];
        if version != ENCRYPTION_VERSION {
            return Err(PakError::invalid_format(format!(
                "Unsupported encryption version: {version}"
            )));
        }

        let nonce = Nonce::from_slice(&data[HEADER_SIZE..HEADER_SIZE + NONCE_SIZE]);
        let encrypted = &data[HEADER_SIZE + NONCE_SIZE..];

        self.cipher()?
            .decrypt(
                nonce,
                Payload {
                    msg: encrypted,
                    aad: &data[..HEADER_SIZE],
                },
            )
            .map_err(|_| PakError::authentication("wrong password or tampered archive"))
    }
}

impl fmt::Debug for PasswordCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCipher").finish_non_exhaustive()
    }
}
