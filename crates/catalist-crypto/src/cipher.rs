//! Per-field AES-256-GCM encryption/decryption
//!
//! Each call to [`RecordCipher::encrypt`] draws a fresh 96-bit nonce from the
//! OS random source. Nonce reuse under one key is the single unrecoverable
//! failure of GCM, so nonces are never counters and never derived from
//! content.
//!
//! Decryption is all-or-nothing: a wrong key, a flipped bit, a truncated
//! ciphertext or a malformed nonce all surface as
//! [`CryptoError::DecryptionFailed`], never as garbled text.

use std::sync::OnceLock;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use crate::envelope::Envelope;
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::SessionKey;
use crate::NONCE_SIZE;

/// Lifecycle of a [`RecordCipher`]. There is no rekeying state: a new key
/// means a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherState {
    Uninitialized,
    Ready,
}

/// Converts between plaintext fields and [`Envelope`]s under one session key.
///
/// The key is bound exactly once and only read afterwards, so a single
/// instance can be shared across tasks without locking.
#[derive(Default)]
pub struct RecordCipher {
    aead: OnceLock<Aes256Gcm>,
}

impl RecordCipher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cipher that is already `Ready`.
    pub fn with_key(key: &SessionKey) -> Self {
        let cipher = Self::new();
        let _ = cipher.aead.set(Aes256Gcm::new(key.as_bytes().into()));
        cipher
    }

    /// Bind the session key. Fails if a key is already bound.
    pub fn initialize(&self, key: &SessionKey) -> CryptoResult<()> {
        self.aead
            .set(Aes256Gcm::new(key.as_bytes().into()))
            .map_err(|_| CryptoError::AlreadyInitialized)
    }

    pub fn state(&self) -> CipherState {
        if self.aead.get().is_some() {
            CipherState::Ready
        } else {
            CipherState::Uninitialized
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == CipherState::Ready
    }

    fn ready(&self) -> CryptoResult<&Aes256Gcm> {
        self.aead.get().ok_or(CryptoError::Uninitialized)
    }

    /// Encrypt one plaintext field into a new envelope.
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<Envelope> {
        let aead = self.ready()?;
        let nonce_bytes = random_nonce()?;

        let ciphertext = aead
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(format!("AES-GCM seal: {e}")))?;

        Ok(Envelope::seal(&ciphertext, nonce_bytes))
    }

    /// Decrypt an envelope back into its plaintext field.
    pub fn decrypt(&self, envelope: &Envelope) -> CryptoResult<String> {
        let aead = self.ready()?;
        let nonce_bytes = envelope.nonce()?;
        let ciphertext = envelope.ciphertext()?;

        let plaintext = aead
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| {
                CryptoError::DecryptionFailed(
                    "authentication failed: wrong key or corrupted envelope".into(),
                )
            })?;

        String::from_utf8(plaintext).map_err(|e| {
            let mut bytes = e.into_bytes();
            bytes.zeroize();
            CryptoError::DecryptionFailed("plaintext is not valid UTF-8".into())
        })
    }
}

impl std::fmt::Debug for RecordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCipher")
            .field("state", &self.state())
            .finish()
    }
}

fn random_nonce() -> CryptoResult<[u8; NONCE_SIZE]> {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| CryptoError::CryptoUnavailable(format!("OS random source: {e}")))?;
    Ok(nonce)
}
