//! Key derivation: PBKDF2-HMAC-SHA256 passphrase → session key

use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::{KEY_SIZE, PBKDF2_ITERATIONS, SHARED_SALT};

/// A 256-bit AES-GCM key derived from the workspace passphrase.
///
/// Lives only in memory for the duration of a session. Zeroized on drop.
#[derive(Clone)]
pub struct SessionKey {
    bytes: [u8; KEY_SIZE],
}

impl SessionKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 parameters.
///
/// All participants of a workspace must use identical parameters or they
/// will derive different keys from the same passphrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    /// PBKDF2 round count (default: 100,000)
    pub iterations: u32,
    /// Salt bytes (default: `"shared-salt"`)
    pub salt: Vec<u8>,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: PBKDF2_ITERATIONS,
            salt: SHARED_SALT.to_vec(),
        }
    }
}

impl KdfParams {
    pub fn validate(&self) -> CryptoResult<()> {
        if self.iterations == 0 {
            return Err(CryptoError::InvalidParams(
                "PBKDF2 iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Whether these are the interoperable defaults every client ships with.
    pub fn is_default(&self) -> bool {
        self.iterations == PBKDF2_ITERATIONS && self.salt == SHARED_SALT
    }
}

/// Derive a 256-bit session key from a passphrase with PBKDF2-HMAC-SHA256.
///
/// The passphrase is used as-is (UTF-8 bytes, no normalization or trimming)
/// and any length is accepted; rejecting empty input is up to the caller.
pub fn derive_session_key(
    passphrase: &SecretString,
    params: &KdfParams,
) -> CryptoResult<SessionKey> {
    params.validate()?;

    tracing::debug!(
        iterations = params.iterations,
        salt_len = params.salt.len(),
        "deriving session key"
    );

    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(
        passphrase.expose_secret().as_bytes(),
        &params.salt,
        params.iterations,
        &mut key,
    );

    Ok(SessionKey::from_bytes(key))
}

/// Derive a session key on the blocking pool so the calling task suspends
/// instead of stalling the runtime for the duration of the stretch.
pub async fn derive_session_key_async(
    passphrase: SecretString,
    params: KdfParams,
) -> CryptoResult<SessionKey> {
    let handle = tokio::runtime::Handle::try_current()
        .map_err(|e| CryptoError::CryptoUnavailable(format!("no async runtime: {e}")))?;

    handle
        .spawn_blocking(move || derive_session_key(&passphrase, &params))
        .await
        .map_err(|e| CryptoError::CryptoUnavailable(format!("key derivation worker: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn fast_params() -> KdfParams {
        KdfParams {
            iterations: 1000,
            salt: SHARED_SALT.to_vec(),
        }
    }

    #[test]
    fn test_kdf_deterministic() {
        let passphrase = SecretString::from("correct horse battery staple");

        let key1 = derive_session_key(&passphrase, &KdfParams::default()).unwrap();
        let key2 = derive_session_key(&passphrase, &KdfParams::default()).unwrap();

        assert_eq!(
            key1.as_bytes(),
            key2.as_bytes(),
            "KDF must be deterministic"
        );
    }

    #[test]
    fn test_pbkdf2_sha256_known_answers() {
        // RFC 6070 inputs run through PBKDF2-HMAC-SHA256, dkLen = 32
        let passphrase = SecretString::from("password");

        let one_round = KdfParams {
            iterations: 1,
            salt: b"salt".to_vec(),
        };
        let key = derive_session_key(&passphrase, &one_round).unwrap();
        assert_eq!(
            hex(key.as_bytes()),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );

        let many_rounds = KdfParams {
            iterations: 4096,
            salt: b"salt".to_vec(),
        };
        let key = derive_session_key(&passphrase, &many_rounds).unwrap();
        assert_eq!(
            hex(key.as_bytes()),
            "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a"
        );
    }

    #[test]
    fn test_kdf_different_passphrases() {
        let key1 = derive_session_key(&SecretString::from("passphrase-a"), &fast_params()).unwrap();
        let key2 = derive_session_key(&SecretString::from("passphrase-b"), &fast_params()).unwrap();

        assert_ne!(
            key1.as_bytes(),
            key2.as_bytes(),
            "different passphrases must produce different keys"
        );
    }

    #[test]
    fn test_kdf_different_salts() {
        let passphrase = SecretString::from("same-passphrase");
        let other_salt = KdfParams {
            salt: b"workspace-7f3a".to_vec(),
            ..fast_params()
        };

        let key1 = derive_session_key(&passphrase, &fast_params()).unwrap();
        let key2 = derive_session_key(&passphrase, &other_salt).unwrap();

        assert_ne!(
            key1.as_bytes(),
            key2.as_bytes(),
            "different salts must produce different keys"
        );
    }

    #[test]
    fn test_kdf_accepts_short_and_odd_input() {
        for input in ["", "x", "  ", "пароль 🔑", "\0\n\t"] {
            let key = derive_session_key(&SecretString::from(input), &fast_params()).unwrap();
            assert_eq!(key.as_bytes().len(), KEY_SIZE);
        }
    }

    #[test]
    fn test_kdf_rejects_zero_iterations() {
        let params = KdfParams {
            iterations: 0,
            ..KdfParams::default()
        };
        let result = derive_session_key(&SecretString::from("pass"), &params);
        assert!(matches!(result, Err(CryptoError::InvalidParams(_))));
    }

    #[test]
    fn test_default_params_are_design_point() {
        let params = KdfParams::default();
        assert_eq!(params.iterations, 100_000);
        assert_eq!(params.salt, b"shared-salt");
        assert!(params.is_default());
        assert!(!fast_params().is_default());
    }

    #[test]
    fn test_session_key_debug_redacts() {
        let key = SessionKey::from_bytes([0xABu8; KEY_SIZE]);
        let debug_output = format!("{key:?}");
        assert!(debug_output.contains("REDACTED"));
        assert!(!debug_output.contains("171"));
    }

    #[tokio::test]
    async fn test_async_matches_sync() {
        let passphrase = "shared workspace secret";
        let sync_key = derive_session_key(&SecretString::from(passphrase), &fast_params()).unwrap();
        let async_key = derive_session_key_async(SecretString::from(passphrase), fast_params())
            .await
            .unwrap();
        assert_eq!(sync_key.as_bytes(), async_key.as_bytes());
    }
}
