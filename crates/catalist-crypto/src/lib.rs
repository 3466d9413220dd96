//! catalist-crypto: client-side E2E encryption for catalist workspaces
//!
//! Every user-authored string (case titles, task text, statuses, notes,
//! comments) is encrypted before it reaches the document store. The store is
//! treated as untrusted and fully visible.
//!
//! ```text
//! passphrase ──PBKDF2-HMAC-SHA256 (100k rounds, salt "shared-salt")──▶ SessionKey (256-bit)
//!                                                                        │
//! plaintext field ──AES-256-GCM (random 96-bit nonce per call)──────────┴──▶ Envelope { cipher, iv }
//! ```
//!
//! One Envelope per field. Sibling fields on the same document are encrypted
//! independently so each can be replaced without touching the others.

pub mod batch;
pub mod canary;
pub mod cipher;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod session;

pub use batch::{decrypt_batch, DecryptedBatch, DecryptedRecord, SkippedRecord};
pub use canary::{create_canary, verify_canary, CANARY_PLAINTEXT};
pub use cipher::{CipherState, RecordCipher};
pub use envelope::Envelope;
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_session_key, derive_session_key_async, KdfParams, SessionKey};
pub use session::Session;

/// Size of a session key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// PBKDF2 round count shared by every participant of a workspace
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Fixed application-wide salt.
///
/// Every workspace derives from the same salt, so identical passphrases in
/// unrelated workspaces yield identical keys. Known weakness; changing it
/// breaks compatibility with every existing envelope.
pub const SHARED_SALT: &[u8] = b"shared-salt";
