//! Session context: one derived key, one bound cipher, passed explicitly.
//!
//! Replaces a process-wide "current key": every call site receives the
//! `Session` it works for, so independent sessions (two workspaces, or tests)
//! can coexist in one process.

use std::fmt::Display;
use std::sync::Arc;

use secrecy::SecretString;

use crate::batch::{decrypt_batch, DecryptedBatch};
use crate::canary;
use crate::cipher::RecordCipher;
use crate::envelope::Envelope;
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_session_key_async, KdfParams, SessionKey};

/// A ready-to-use encryption session. Cheap to clone; clones share the key.
#[derive(Clone, Debug)]
pub struct Session {
    cipher: Arc<RecordCipher>,
}

impl Session {
    /// Derive the session key from the passphrase and bind it.
    ///
    /// Any failure here aborts session bootstrap; there is no degraded mode.
    pub async fn open(passphrase: SecretString, params: KdfParams) -> CryptoResult<Self> {
        if !params.is_default() {
            tracing::warn!(
                iterations = params.iterations,
                "non-default KDF parameters: keys will not match clients using the defaults"
            );
        }
        let key = derive_session_key_async(passphrase, params).await?;
        Ok(Self::from_key(&key))
    }

    pub fn from_key(key: &SessionKey) -> Self {
        Self {
            cipher: Arc::new(RecordCipher::with_key(key)),
        }
    }

    /// The bound cipher, for synchronous callers.
    pub fn cipher(&self) -> &RecordCipher {
        &self.cipher
    }

    pub async fn encrypt(&self, plaintext: &str) -> CryptoResult<Envelope> {
        let plaintext = plaintext.to_owned();
        self.run(move |cipher| cipher.encrypt(&plaintext)).await
    }

    pub async fn decrypt(&self, envelope: &Envelope) -> CryptoResult<String> {
        let envelope = envelope.clone();
        self.run(move |cipher| cipher.decrypt(&envelope)).await
    }

    /// Decrypt a listing, omitting records that fail to decrypt.
    pub async fn decrypt_batch<K>(
        &self,
        items: Vec<(K, Envelope)>,
    ) -> CryptoResult<DecryptedBatch<K>>
    where
        K: Display + Send + 'static,
    {
        self.run(move |cipher| decrypt_batch(cipher, items)).await
    }

    pub async fn create_canary(&self) -> CryptoResult<Envelope> {
        self.run(canary::create_canary).await
    }

    pub async fn verify_canary(&self, envelope: &Envelope) -> CryptoResult<bool> {
        let envelope = envelope.clone();
        self.run(move |cipher| canary::verify_canary(cipher, &envelope))
            .await
    }

    async fn run<T, F>(&self, op: F) -> CryptoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&RecordCipher) -> CryptoResult<T> + Send + 'static,
    {
        let cipher = Arc::clone(&self.cipher);
        tokio::task::spawn_blocking(move || op(cipher.as_ref()))
            .await
            .map_err(|e| CryptoError::CryptoUnavailable(format!("crypto worker: {e}")))?
    }
}
