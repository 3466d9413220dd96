//! Passphrase canary
//!
//! A wrong passphrase otherwise shows up only as an empty listing (every
//! record is skipped). A canary envelope of a well-known plaintext, written
//! when the workspace is created, gives an explicit yes/no at session start
//! without changing how records are encrypted.

use crate::cipher::RecordCipher;
use crate::envelope::Envelope;
use crate::error::CryptoResult;

/// Plaintext sealed inside every canary envelope
pub const CANARY_PLAINTEXT: &str = "catalist-canary-v1";

/// Seal the canary plaintext under the cipher's session key.
pub fn create_canary(cipher: &RecordCipher) -> CryptoResult<Envelope> {
    cipher.encrypt(CANARY_PLAINTEXT)
}

/// Check whether the cipher's key opens the canary.
///
/// Returns `Ok(false)` for a wrong key or a damaged canary. Errors are
/// reserved for conditions that are fatal to the session anyway.
pub fn verify_canary(cipher: &RecordCipher, canary: &Envelope) -> CryptoResult<bool> {
    match cipher.decrypt(canary) {
        Ok(plaintext) => Ok(plaintext == CANARY_PLAINTEXT),
        Err(e) if e.is_record_local() => {
            tracing::debug!(error = %e, "canary did not open");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
