//! Listing decryption with per-record isolation.
//!
//! One undecryptable record (foreign key, corruption) must not take down a
//! whole listing: it is logged, reported in `skipped`, and the rest of the
//! batch is returned in input order.

use std::fmt::Display;

use crate::cipher::RecordCipher;
use crate::envelope::Envelope;
use crate::error::{CryptoError, CryptoResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedRecord<K> {
    pub id: K,
    pub plaintext: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord<K> {
    pub id: K,
    pub reason: String,
}

/// Outcome of decrypting a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedBatch<K> {
    /// Successfully decrypted records, in input order
    pub records: Vec<DecryptedRecord<K>>,
    /// Records left out of the listing
    pub skipped: Vec<SkippedRecord<K>>,
}

impl<K> Default for DecryptedBatch<K> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<K> DecryptedBatch<K> {
    pub fn plaintexts(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.plaintext.as_str())
    }
}

/// Decrypt a listing of `(id, envelope)` pairs.
///
/// Only [`CryptoError::DecryptionFailed`] is absorbed per record. Using an
/// uninitialized cipher fails the whole call before any record is read.
pub fn decrypt_batch<K, I>(cipher: &RecordCipher, items: I) -> CryptoResult<DecryptedBatch<K>>
where
    K: Display,
    I: IntoIterator<Item = (K, Envelope)>,
{
    if !cipher.is_ready() {
        return Err(CryptoError::Uninitialized);
    }

    let mut batch = DecryptedBatch::default();
    for (id, envelope) in items {
        match cipher.decrypt(&envelope) {
            Ok(plaintext) => batch.records.push(DecryptedRecord { id, plaintext }),
            Err(e) if e.is_record_local() => {
                tracing::warn!(record = %id, error = %e, "skipping undecryptable record");
                batch.skipped.push(SkippedRecord {
                    id,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    if !batch.skipped.is_empty() {
        tracing::info!(
            decrypted = batch.records.len(),
            skipped = batch.skipped.len(),
            "listing decrypted with omissions"
        );
    }

    Ok(batch)
}
