//! Stored envelope format
//!
//! One encrypted field at rest, as written to the document store:
//! ```text
//! {
//!   "cipher": "<base64(ciphertext || 16-byte GCM tag)>",
//!   "iv":     [12 integers]
//! }
//! ```
//!
//! The nonce is kept as a plain byte array, not base64, so every writer and
//! reader of a workspace agrees on one representation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};
use crate::{NONCE_SIZE, TAG_SIZE};

/// A single encrypted field: authenticated ciphertext plus its nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Base64 of ciphertext with the GCM tag appended
    pub cipher: String,
    /// 96-bit nonce, unique per encryption
    pub iv: Vec<u8>,
}

impl Envelope {
    pub(crate) fn seal(ciphertext: &[u8], nonce: [u8; NONCE_SIZE]) -> Self {
        Self {
            cipher: STANDARD.encode(ciphertext),
            iv: nonce.to_vec(),
        }
    }

    /// Decoded ciphertext bytes (tag included).
    pub fn ciphertext(&self) -> CryptoResult<Vec<u8>> {
        let bytes = STANDARD
            .decode(self.cipher.as_bytes())
            .map_err(|e| CryptoError::DecryptionFailed(format!("cipher is not base64: {e}")))?;

        if bytes.len() < TAG_SIZE {
            return Err(CryptoError::DecryptionFailed(format!(
                "ciphertext too short: {} bytes (minimum {TAG_SIZE})",
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    /// The nonce as a fixed-size array.
    pub fn nonce(&self) -> CryptoResult<[u8; NONCE_SIZE]> {
        self.iv.as_slice().try_into().map_err(|_| {
            CryptoError::DecryptionFailed(format!(
                "nonce must be {NONCE_SIZE} bytes, got {}",
                self.iv.len()
            ))
        })
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> CryptoResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| CryptoError::EncryptionFailed(format!("envelope serialization: {e}")))
    }

    /// Deserialize from JSON bytes. A document that is not an envelope at all
    /// cannot be decrypted, so it is reported the same way as a bad tag.
    pub fn from_bytes(data: &[u8]) -> CryptoResult<Self> {
        serde_json::from_slice(data)
            .map_err(|e| CryptoError::DecryptionFailed(format!("envelope deserialization: {e}")))
    }
}
