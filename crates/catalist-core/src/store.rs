//! Local notes store: a bare JSON array of note envelopes.
//!
//! Loaded entirely into memory and flushed atomically via temp+rename. The
//! store only ever holds ciphertext; it has no key and no way to read a note.
//!
//! Entries are parsed one by one. An entry that is not a usable envelope is
//! kept verbatim at its position and reported by [`NoteStore::malformed`],
//! so one damaged note never makes the rest of the file unreadable.

use std::path::{Path, PathBuf};

use catalist_crypto::{Envelope, SkippedRecord};
use serde_json::Value;

use crate::error::{CatalistError, CatalistResult};

enum StoredNote {
    Note(Envelope),
    /// Left exactly as found on disk
    Malformed { raw: Value, reason: String },
}

/// In-memory list of note envelopes, persisted to a JSON file
pub struct NoteStore {
    path: PathBuf,
    entries: Vec<StoredNote>,
    /// Whether there are unsaved changes
    dirty: bool,
}

impl NoteStore {
    /// Load the store at `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> CatalistResult<Self> {
        let raw: Vec<Value> = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| {
                CatalistError::Store(format!("reading notes file {}: {e}", path.display()))
            })?;
            serde_json::from_str(&content).map_err(|e| {
                CatalistError::Store(format!("parsing notes file {}: {e}", path.display()))
            })?
        } else {
            Vec::new()
        };

        let entries = raw
            .into_iter()
            .enumerate()
            .map(|(index, value)| match parse_note(&value) {
                Ok(envelope) => StoredNote::Note(envelope),
                Err(reason) => {
                    tracing::warn!(note = index, error = %reason, "malformed note entry");
                    StoredNote::Malformed { raw: value, reason }
                }
            })
            .collect();

        Ok(NoteStore {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Well-formed envelopes with their positions in the file.
    pub fn list(&self) -> impl Iterator<Item = (usize, &Envelope)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                StoredNote::Note(envelope) => Some((index, envelope)),
                StoredNote::Malformed { .. } => None,
            })
    }

    /// Entries that could not be read as envelopes.
    pub fn malformed(&self) -> Vec<SkippedRecord<usize>> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                StoredNote::Malformed { reason, .. } => Some(SkippedRecord {
                    id: index,
                    reason: reason.clone(),
                }),
                StoredNote::Note(_) => None,
            })
            .collect()
    }

    /// Append an envelope and return its index.
    pub fn add(&mut self, envelope: Envelope) -> CatalistResult<usize> {
        validate(&envelope).map_err(CatalistError::Store)?;
        self.entries.push(StoredNote::Note(envelope));
        self.dirty = true;
        Ok(self.entries.len() - 1)
    }

    /// Replace the entry at `index` with a freshly encrypted envelope.
    pub fn replace(&mut self, index: usize, envelope: Envelope) -> CatalistResult<()> {
        validate(&envelope).map_err(CatalistError::Store)?;
        let len = self.entries.len();
        let slot = self
            .entries
            .get_mut(index)
            .ok_or_else(|| out_of_range(index, len))?;
        *slot = StoredNote::Note(envelope);
        self.dirty = true;
        Ok(())
    }

    /// Remove the entry at `index`, malformed or not.
    pub fn remove(&mut self, index: usize) -> CatalistResult<()> {
        if index >= self.entries.len() {
            return Err(out_of_range(index, self.entries.len()));
        }
        self.entries.remove(index);
        self.dirty = true;
        Ok(())
    }

    /// Number of entries, malformed ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flush dirty changes to disk using an atomic write (write then rename).
    pub fn flush(&mut self) -> CatalistResult<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CatalistError::Store(format!("creating notes dir {}: {e}", parent.display()))
                })?;
            }
        }

        let values = self
            .entries
            .iter()
            .map(|entry| match entry {
                StoredNote::Note(envelope) => serde_json::to_value(envelope),
                StoredNote::Malformed { raw, .. } => Ok(raw.clone()),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let json = serde_json::to_string_pretty(&values)?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &json).map_err(|e| {
            CatalistError::Store(format!("writing notes temp {}: {e}", tmp_path.display()))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            CatalistError::Store(format!("renaming notes file {}: {e}", self.path.display()))
        })?;

        tracing::debug!(path = %self.path.display(), notes = self.entries.len(), "notes flushed");
        self.dirty = false;
        Ok(())
    }
}

impl Drop for NoteStore {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.flush() {
                tracing::warn!("failed to flush notes store on drop: {e}");
            }
        }
    }
}

fn validate(envelope: &Envelope) -> Result<(), String> {
    if envelope.cipher.is_empty() || envelope.iv.is_empty() {
        return Err("invalid note: cipher and iv are required".into());
    }
    Ok(())
}

fn parse_note(value: &Value) -> Result<Envelope, String> {
    let envelope: Envelope =
        serde_json::from_value(value.clone()).map_err(|e| format!("not an envelope: {e}"))?;
    validate(&envelope)?;
    Ok(envelope)
}

fn out_of_range(index: usize, len: usize) -> CatalistError {
    CatalistError::Store(format!("note index {index} out of range ({len} notes)"))
}
