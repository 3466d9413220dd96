use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Failure conditions of the encryption subsystem.
///
/// Messages never carry plaintext or key material.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The platform cannot perform a primitive (RNG, worker pool). Fatal to
    /// the session; there is no plaintext fallback.
    #[error("crypto unavailable: {0}")]
    CryptoUnavailable(String),

    /// encrypt/decrypt called before a session key was bound.
    #[error("record cipher used before a session key was bound")]
    Uninitialized,

    /// initialize called on a cipher that already holds a key.
    #[error("record cipher already holds a session key")]
    AlreadyInitialized,

    /// Authentication failed: wrong key, tampered or malformed envelope.
    /// Recoverable per record.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("invalid KDF parameters: {0}")]
    InvalidParams(String),
}

impl CryptoError {
    /// True for failures that only affect the record being decrypted.
    pub fn is_record_local(&self) -> bool {
        matches!(self, CryptoError::DecryptionFailed(_))
    }
}
