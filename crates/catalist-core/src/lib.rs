//! catalist shared layer: config schema, error types, the mapping between
//! stored documents and encrypted fields, and the local notes store.
//!
//! Everything here sits on top of `catalist-crypto`; nothing below this
//! crate ever sees a plaintext field name or a file path.

pub mod config;
pub mod documents;
pub mod error;
pub mod store;

pub use config::CatalistConfig;
pub use documents::{
    decrypt_document, decrypt_documents, encrypt_fields, DecryptedDocument, DocumentListing,
    EncryptedDocument, FieldRole,
};
pub use error::{CatalistError, CatalistResult};
pub use store::NoteStore;
