//! Mapping between stored documents and their encrypted fields.
//!
//! A stored document carries each encrypted field as a pair of sibling keys
//! (`descCipher` / `descIv`, ...). Every field is its own [`Envelope`] with
//! its own nonce; fields are never encrypted jointly. Cleartext metadata
//! (`username`, `status`, `createdAt`, ...) passes through untouched.
//!
//! A document is only readable as a whole: if any one of its fields fails to
//! decrypt, the document is dropped from a listing rather than shown with
//! holes in it.

use std::collections::BTreeMap;
use std::fmt;

use catalist_crypto::{CryptoError, CryptoResult, Envelope, RecordCipher, SkippedRecord};
use serde_json::{Map, Value};

use crate::error::{CatalistError, CatalistResult};

/// Cleartext author key
const AUTHOR_KEY: &str = "username";
const ID_KEY: &str = "id";
/// Nested `{cipher, iv}` object some writers use for the note field
const NESTED_NOTE_KEY: &str = "taskNote";

/// What an encrypted field means within its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldRole {
    /// Main body of a plain note
    Body,
    Title,
    Text,
    /// Task or case description
    Description,
    Status,
    /// Note attached to a task
    Note,
    Comment,
}

impl FieldRole {
    pub const ALL: [FieldRole; 7] = [
        FieldRole::Body,
        FieldRole::Title,
        FieldRole::Text,
        FieldRole::Description,
        FieldRole::Status,
        FieldRole::Note,
        FieldRole::Comment,
    ];

    /// Stored `(cipher, iv)` key names.
    pub fn stored_keys(self) -> (&'static str, &'static str) {
        match self {
            FieldRole::Body => ("cipher", "iv"),
            FieldRole::Title => ("titleCipher", "titleIv"),
            FieldRole::Text => ("textCipher", "textIv"),
            FieldRole::Description => ("descCipher", "descIv"),
            FieldRole::Status => ("statusCipher", "statusIv"),
            FieldRole::Note => ("noteCipher", "noteIv"),
            FieldRole::Comment => ("commentCipher", "commentIv"),
        }
    }

    /// Key of the decrypted value in a plaintext document.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldRole::Body => "body",
            FieldRole::Title => "title",
            FieldRole::Text => "text",
            FieldRole::Description => "description",
            FieldRole::Status => "status",
            FieldRole::Note => "note",
            FieldRole::Comment => "comment",
        }
    }
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document: encrypted fields plus cleartext metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedDocument {
    pub id: String,
    pub fields: BTreeMap<FieldRole, Envelope>,
    pub author: Option<String>,
    /// Cleartext keys that are neither fields nor the author
    pub extra: Map<String, Value>,
}

impl EncryptedDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
            author: None,
            extra: Map::new(),
        }
    }

    /// Parse a stored document.
    ///
    /// A field whose cipher is present without its nonce (or the reverse) is
    /// a [`CatalistError::MissingField`]. The note field is also accepted in
    /// its nested `taskNote: {cipher, iv}` form.
    pub fn from_json(id: impl Into<String>, value: &Value) -> CatalistResult<Self> {
        let id = id.into();
        let Some(object) = value.as_object() else {
            return Err(CatalistError::Document(format!("{id}: not a JSON object")));
        };

        let mut doc = Self::new(id);
        let mut consumed: Vec<&str> = vec![ID_KEY, AUTHOR_KEY];

        for role in FieldRole::ALL {
            let (cipher_key, iv_key) = role.stored_keys();
            consumed.extend([cipher_key, iv_key]);

            match (object.get(cipher_key), object.get(iv_key)) {
                (None, None) => {}
                (Some(cipher), Some(iv)) => {
                    let envelope = envelope_from_parts(&doc.id, role, cipher, iv)?;
                    doc.fields.insert(role, envelope);
                }
                (Some(_), None) => {
                    return Err(CatalistError::MissingField {
                        id: doc.id,
                        field: cipher_key,
                        missing: iv_key,
                    })
                }
                (None, Some(_)) => {
                    return Err(CatalistError::MissingField {
                        id: doc.id,
                        field: iv_key,
                        missing: cipher_key,
                    })
                }
            }
        }

        if let Some(nested) = object.get(NESTED_NOTE_KEY) {
            if doc.fields.contains_key(&FieldRole::Note) {
                // Flat keys win; the nested copy stays in `extra`.
                tracing::warn!(
                    document = %doc.id,
                    "both noteCipher and {NESTED_NOTE_KEY} present, keeping {NESTED_NOTE_KEY} as cleartext metadata"
                );
            } else {
                let envelope: Envelope = serde_json::from_value(nested.clone()).map_err(|e| {
                    CatalistError::Document(format!("{}: {NESTED_NOTE_KEY}: {e}", doc.id))
                })?;
                doc.fields.insert(FieldRole::Note, envelope);
                consumed.push(NESTED_NOTE_KEY);
            }
        }

        doc.author = match object.get(AUTHOR_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => Some(name.clone()),
            Some(_) => {
                return Err(CatalistError::Document(format!(
                    "{}: {AUTHOR_KEY} must be a string",
                    doc.id
                )))
            }
        };

        doc.extra = object
            .iter()
            .filter(|(key, _)| !consumed.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(doc)
    }

    /// Serialize back to the stored layout (flat key pairs for every field).
    pub fn to_json(&self) -> Value {
        let mut object = self.extra.clone();
        object.insert(ID_KEY.into(), Value::String(self.id.clone()));
        if let Some(author) = &self.author {
            object.insert(AUTHOR_KEY.into(), Value::String(author.clone()));
        }
        for (role, envelope) in &self.fields {
            let (cipher_key, iv_key) = role.stored_keys();
            object.insert(cipher_key.into(), Value::String(envelope.cipher.clone()));
            object.insert(
                iv_key.into(),
                Value::Array(envelope.iv.iter().map(|b| Value::from(*b)).collect()),
            );
        }
        Value::Object(object)
    }
}

fn envelope_from_parts(
    id: &str,
    role: FieldRole,
    cipher: &Value,
    iv: &Value,
) -> CatalistResult<Envelope> {
    let cipher = cipher
        .as_str()
        .ok_or_else(|| CatalistError::Document(format!("{id}: {role} cipher must be a string")))?;
    let iv: Vec<u8> = serde_json::from_value(iv.clone())
        .map_err(|e| CatalistError::Document(format!("{id}: {role} iv: {e}")))?;
    Ok(Envelope {
        cipher: cipher.to_owned(),
        iv,
    })
}

/// A document with every field decrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedDocument {
    pub id: String,
    pub fields: BTreeMap<FieldRole, String>,
    pub author: Option<String>,
    pub extra: Map<String, Value>,
}

impl DecryptedDocument {
    pub fn field(&self, role: FieldRole) -> Option<&str> {
        self.fields.get(&role).map(String::as_str)
    }

    /// Plaintext view: cleartext metadata plus one key per decrypted field.
    pub fn to_json(&self) -> Value {
        let mut object = self.extra.clone();
        object.insert(ID_KEY.into(), Value::String(self.id.clone()));
        if let Some(author) = &self.author {
            object.insert(AUTHOR_KEY.into(), Value::String(author.clone()));
        }
        for (role, plaintext) in &self.fields {
            object.insert(role.as_str().into(), Value::String(plaintext.clone()));
        }
        Value::Object(object)
    }
}

/// Outcome of decrypting a list of documents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentListing {
    /// Readable documents, in input order
    pub documents: Vec<DecryptedDocument>,
    pub skipped: Vec<SkippedRecord<String>>,
}

/// Decrypt every field of one document.
pub fn decrypt_document(
    cipher: &RecordCipher,
    doc: &EncryptedDocument,
) -> CryptoResult<DecryptedDocument> {
    let mut fields = BTreeMap::new();
    for (role, envelope) in &doc.fields {
        let plaintext = cipher.decrypt(envelope).map_err(|e| match e {
            CryptoError::DecryptionFailed(reason) => {
                CryptoError::DecryptionFailed(format!("{role}: {reason}"))
            }
            other => other,
        })?;
        fields.insert(*role, plaintext);
    }

    Ok(DecryptedDocument {
        id: doc.id.clone(),
        fields,
        author: doc.author.clone(),
        extra: doc.extra.clone(),
    })
}

/// Decrypt a listing of documents, dropping the ones that do not open.
pub fn decrypt_documents<I>(cipher: &RecordCipher, docs: I) -> CryptoResult<DocumentListing>
where
    I: IntoIterator<Item = EncryptedDocument>,
{
    if !cipher.is_ready() {
        return Err(CryptoError::Uninitialized);
    }

    let mut listing = DocumentListing::default();
    for doc in docs {
        match decrypt_document(cipher, &doc) {
            Ok(decrypted) => listing.documents.push(decrypted),
            Err(e) if e.is_record_local() => {
                tracing::warn!(document = %doc.id, error = %e, "skipping undecryptable document");
                listing.skipped.push(SkippedRecord {
                    id: doc.id,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(listing)
}

/// Build a document with one fresh envelope per field.
pub fn encrypt_fields<'a, I>(
    cipher: &RecordCipher,
    id: impl Into<String>,
    fields: I,
    author: Option<String>,
) -> CryptoResult<EncryptedDocument>
where
    I: IntoIterator<Item = (FieldRole, &'a str)>,
{
    let mut doc = EncryptedDocument::new(id);
    doc.author = author;
    for (role, plaintext) in fields {
        doc.fields.insert(role, cipher.encrypt(plaintext)?);
    }
    Ok(doc)
}

/// Parse an exported array of stored documents.
///
/// Elements that cannot be parsed are reported in the second vector instead
/// of failing the whole export. An element without an `id` is named by its
/// position.
pub fn parse_export(
    value: &Value,
) -> CatalistResult<(Vec<EncryptedDocument>, Vec<SkippedRecord<String>>)> {
    let Some(items) = value.as_array() else {
        return Err(CatalistError::Document(
            "export must be a JSON array of documents".into(),
        ));
    };

    let mut docs = Vec::with_capacity(items.len());
    let mut skipped = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let id = match item.get(ID_KEY) {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => format!("#{index}"),
        };
        match EncryptedDocument::from_json(id.clone(), item) {
            Ok(doc) => docs.push(doc),
            Err(e) => {
                tracing::warn!(document = %id, error = %e, "skipping malformed document");
                skipped.push(SkippedRecord {
                    id,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok((docs, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalist_crypto::{SessionKey, KEY_SIZE};
    use serde_json::json;

    fn cipher(seed: u8) -> RecordCipher {
        RecordCipher::with_key(&SessionKey::from_bytes([seed; KEY_SIZE]))
    }

    #[test]
    fn test_task_roundtrip() {
        let c = cipher(1);
        let doc = encrypt_fields(
            &c,
            "task-1",
            [
                (FieldRole::Description, "Evict tenant at 221B"),
                (FieldRole::Note, "court date pending"),
            ],
            Some("hudson".into()),
        )
        .unwrap();

        let stored = doc.to_json();
        assert!(stored["descCipher"].is_string());
        assert_eq!(stored["descIv"].as_array().unwrap().len(), 12);
        assert!(stored.get("noteCipher").is_some());
        assert_ne!(stored["descIv"], stored["noteIv"], "each field gets its own nonce");

        let parsed = EncryptedDocument::from_json("task-1", &stored).unwrap();
        assert_eq!(parsed, doc);

        let plain = decrypt_document(&c, &parsed).unwrap();
        assert_eq!(
            plain.field(FieldRole::Description),
            Some("Evict tenant at 221B")
        );
        assert_eq!(plain.field(FieldRole::Note), Some("court date pending"));
        assert_eq!(plain.author.as_deref(), Some("hudson"));
    }

    #[test]
    fn test_cleartext_metadata_passes_through() {
        let c = cipher(1);
        let body = c.encrypt("buy stamps").unwrap();
        let stored = json!({
            "cipher": body.cipher,
            "iv": body.iv,
            "status": "open",
            "createdAt": 1700000000,
            "username": "mrs-hudson",
        });

        let doc = EncryptedDocument::from_json("n1", &stored).unwrap();
        assert_eq!(doc.extra["status"], "open");
        assert_eq!(doc.extra["createdAt"], 1700000000);
        assert!(!doc.extra.contains_key("cipher"));

        let plain = decrypt_document(&c, &doc).unwrap().to_json();
        assert_eq!(plain["body"], "buy stamps");
        assert_eq!(plain["status"], "open");
        assert_eq!(plain["username"], "mrs-hudson");
        assert_eq!(plain["id"], "n1");
    }

    #[test]
    fn test_nested_task_note() {
        let c = cipher(1);
        let desc = c.encrypt("call the landlord").unwrap();
        let note = c.encrypt("no answer yet").unwrap();
        let stored = json!({
            "descCipher": desc.cipher,
            "descIv": desc.iv,
            "taskNote": { "cipher": note.cipher, "iv": note.iv },
        });

        let doc = EncryptedDocument::from_json("t1", &stored).unwrap();
        let plain = decrypt_document(&c, &doc).unwrap();
        assert_eq!(plain.field(FieldRole::Note), Some("no answer yet"));
        assert!(!doc.extra.contains_key(NESTED_NOTE_KEY));
    }

    #[test]
    fn test_flat_and_nested_note_keeps_both() {
        let c = cipher(1);
        let flat = c.encrypt("flat note").unwrap();
        let nested = c.encrypt("nested note").unwrap();
        let stored = json!({
            "noteCipher": flat.cipher,
            "noteIv": flat.iv,
            "taskNote": { "cipher": nested.cipher, "iv": nested.iv },
        });

        let doc = EncryptedDocument::from_json("t5", &stored).unwrap();
        let plain = decrypt_document(&c, &doc).unwrap();
        assert_eq!(plain.field(FieldRole::Note), Some("flat note"));

        // Nothing is lost on the way back to storage.
        let rewritten = doc.to_json();
        assert_eq!(rewritten[NESTED_NOTE_KEY], stored[NESTED_NOTE_KEY]);
        assert_eq!(rewritten["noteCipher"], stored["noteCipher"]);
    }

    #[test]
    fn test_cipher_without_iv_is_missing_field() {
        let stored = json!({ "descCipher": "AAAA", "status": "open" });
        let err = EncryptedDocument::from_json("t2", &stored).unwrap_err();

        match err {
            CatalistError::MissingField { id, field, missing } => {
                assert_eq!(id, "t2");
                assert_eq!(field, "descCipher");
                assert_eq!(missing, "descIv");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_iv_without_cipher_is_missing_field() {
        let stored = json!({ "titleIv": [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11] });
        assert!(matches!(
            EncryptedDocument::from_json("t3", &stored),
            Err(CatalistError::MissingField { .. })
        ));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            EncryptedDocument::from_json("x", &json!([1, 2, 3])),
            Err(CatalistError::Document(_))
        ));
    }

    #[test]
    fn test_one_bad_field_drops_whole_document() {
        let ours = cipher(1);
        let theirs = cipher(2);

        let mut mixed = encrypt_fields(&ours, "t4", [(FieldRole::Description, "ours")], None)
            .unwrap();
        mixed
            .fields
            .insert(FieldRole::Note, theirs.encrypt("theirs").unwrap());

        let err = decrypt_document(&ours, &mixed).unwrap_err();
        assert!(matches!(err, CryptoError::DecryptionFailed(_)));
        assert!(err.to_string().contains("note"));
    }

    #[test]
    fn test_listing_skips_foreign_documents() {
        let ours = cipher(1);
        let theirs = cipher(2);
        let docs = vec![
            encrypt_fields(&ours, "a", [(FieldRole::Text, "first")], None).unwrap(),
            encrypt_fields(&theirs, "b", [(FieldRole::Text, "foreign")], None).unwrap(),
            encrypt_fields(&ours, "c", [(FieldRole::Text, "third")], None).unwrap(),
        ];

        let listing = decrypt_documents(&ours, docs).unwrap();

        let texts: Vec<_> = listing
            .documents
            .iter()
            .map(|d| d.field(FieldRole::Text).unwrap())
            .collect();
        assert_eq!(texts, ["first", "third"]);
        assert_eq!(listing.skipped.len(), 1);
        assert_eq!(listing.skipped[0].id, "b");
    }

    #[test]
    fn test_listing_with_uninitialized_cipher_fails() {
        let docs = vec![encrypt_fields(&cipher(1), "a", [(FieldRole::Body, "x")], None).unwrap()];
        assert!(matches!(
            decrypt_documents(&RecordCipher::new(), docs),
            Err(CryptoError::Uninitialized)
        ));
    }

    #[test]
    fn test_parse_export_isolates_malformed_entries() {
        let c = cipher(1);
        let good = encrypt_fields(&c, "ok", [(FieldRole::Body, "fine")], None)
            .unwrap()
            .to_json();
        let export = json!([good, { "id": "broken", "noteCipher": "AAAA" }, "not an object"]);

        let (docs, skipped) = parse_export(&export).unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "ok");
        let ids: Vec<_> = skipped.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["broken", "#2"]);
    }

    #[test]
    fn test_parse_export_requires_array() {
        assert!(parse_export(&json!({ "id": "a" })).is_err());
    }
}
