//! Record codec: plaintext record <-> encrypted envelope.
//!
//! A stored record is exactly one of two shapes, enforced by the type:
//! - `Plain` — the full business record as a JSON object.
//! - `Encrypted` — `id` and the store's indexed attributes in plaintext,
//!   every other field folded into one opaque `payload` string.
//!
//! Both transforms are idempotent: encrypting an envelope or decrypting a
//! plain record returns the input unchanged.  That pass-through is what
//! keeps legacy plaintext rows readable through the same code path.

use serde_json::{Map, Value};

use cofre_crypto::{aead, SessionKey};

use crate::error::StoreError;
use crate::schema::StoreDef;

/// Envelope form: what an encrypted record looks like on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub id: String,
    /// Indexed attributes, kept queryable in plaintext.
    pub attrs: Map<String, Value>,
    /// `base64(nonce).base64(ciphertext)`.
    pub payload: String,
}

/// A record as it exists in a store: plaintext or encrypted, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredRecord {
    Plain(Map<String, Value>),
    Encrypted(Envelope),
}

impl StoredRecord {
    /// Classify a JSON value by shape: an object carrying a string
    /// `payload` is an envelope, any other object is plaintext.
    pub fn from_value(value: Value) -> Result<Self, StoreError> {
        let Value::Object(mut obj) = value else {
            return Err(StoreError::Validation("record must be a JSON object".into()));
        };

        let payload = match obj.remove("payload") {
            Some(Value::String(payload)) => payload,
            Some(other) => {
                // A non-string payload is not an envelope; leave it alone.
                obj.insert("payload".into(), other);
                return Ok(StoredRecord::Plain(obj));
            }
            None => return Ok(StoredRecord::Plain(obj)),
        };
        let id = match obj.remove("id") {
            Some(Value::String(id)) => id,
            _ => return Err(StoreError::Validation("envelope is missing an id".into())),
        };
        Ok(StoredRecord::Encrypted(Envelope {
            id,
            attrs: obj,
            payload,
        }))
    }

    /// Primary key, if present.
    pub fn id(&self) -> Option<&str> {
        match self {
            StoredRecord::Plain(map) => map.get("id").and_then(Value::as_str),
            StoredRecord::Encrypted(env) => Some(&env.id),
        }
    }

    /// One indexed attribute, as the string the column stores.
    pub fn attr(&self, name: &str) -> Option<String> {
        let map = match self {
            StoredRecord::Plain(map) => map,
            StoredRecord::Encrypted(env) => &env.attrs,
        };
        map.get(name).and_then(Value::as_str).map(str::to_owned)
    }

    /// The on-disk JSON form, leaving `self` intact.
    pub fn to_value(&self) -> Value {
        self.clone().into_value()
    }

    /// The on-disk JSON form.
    pub fn into_value(self) -> Value {
        match self {
            StoredRecord::Plain(map) => Value::Object(map),
            StoredRecord::Encrypted(env) => {
                let mut obj = env.attrs;
                obj.insert("id".into(), Value::String(env.id));
                obj.insert("payload".into(), Value::String(env.payload));
                Value::Object(obj)
            }
        }
    }
}

/// Encrypt a record for storage in `def`.  Already-encrypted input is
/// returned unchanged — never re-encrypted.
pub fn encrypt(def: &StoreDef, record: StoredRecord, key: &SessionKey) -> Result<StoredRecord, StoreError> {
    let map = match record {
        StoredRecord::Encrypted(_) => return Ok(record),
        StoredRecord::Plain(map) => map,
    };

    let id = match map.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_owned(),
        _ => return Err(StoreError::Validation("record is missing an id".into())),
    };

    // The payload carries the whole record, so decryption restores it
    // byte-for-byte; the plaintext attrs on the envelope are mirrors.
    let serialized = serde_json::to_vec(&map)?;
    let payload = aead::seal(&key.0, &serialized)?;

    let mut attrs = Map::new();
    for name in def.indexed {
        if let Some(value) = map.get(*name) {
            attrs.insert((*name).to_owned(), value.clone());
        }
    }

    Ok(StoredRecord::Encrypted(Envelope { id, attrs, payload }))
}

/// Decrypt a stored record.  Plaintext input passes through unchanged.
pub fn decrypt(record: StoredRecord, key: &SessionKey) -> Result<StoredRecord, StoreError> {
    let env = match record {
        StoredRecord::Plain(_) => return Ok(record),
        StoredRecord::Encrypted(env) => env,
    };

    let plaintext = aead::open(&key.0, &env.payload)?;
    let map: Map<String, Value> = serde_json::from_slice(&plaintext)?;
    Ok(StoredRecord::Plain(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::schema::store_def;

    fn key() -> SessionKey {
        SessionKey([3u8; 32])
    }

    fn boleto() -> StoredRecord {
        StoredRecord::from_value(json!({
            "id": "b1",
            "companyId": "c1",
            "dueDate": "2026-09-01",
            "description": "Aluguel",
            "amount": 1500.0,
        }))
        .unwrap()
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let def = store_def("boletos").unwrap();
        let original = boleto();

        let encrypted = encrypt(def, original.clone(), &key()).unwrap();
        let StoredRecord::Encrypted(env) = &encrypted else {
            panic!("expected envelope");
        };
        assert_eq!(env.id, "b1");
        assert_eq!(env.attrs.get("companyId"), Some(&json!("c1")));
        assert_eq!(env.attrs.get("dueDate"), Some(&json!("2026-09-01")));
        // Business fields must not leak onto the envelope.
        assert!(env.attrs.get("description").is_none());
        assert!(env.attrs.get("amount").is_none());
        assert!(env.payload.contains('.'));

        let decrypted = decrypt(encrypted, &key()).unwrap();
        assert_eq!(decrypted, original);
    }

    #[test]
    fn decrypt_of_plaintext_is_identity() {
        let original = boleto();
        assert_eq!(decrypt(original.clone(), &key()).unwrap(), original);
    }

    #[test]
    fn double_encrypt_is_a_no_op() {
        let def = store_def("boletos").unwrap();
        let once = encrypt(def, boleto(), &key()).unwrap();
        let twice = encrypt(def, once.clone(), &key()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn encrypt_requires_an_id() {
        let def = store_def("boletos").unwrap();
        let record = StoredRecord::from_value(json!({"companyId": "c1"})).unwrap();
        assert!(matches!(
            encrypt(def, record, &key()),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn wrong_key_fails_closed() {
        let def = store_def("boletos").unwrap();
        let encrypted = encrypt(def, boleto(), &key()).unwrap();
        let other = SessionKey([4u8; 32]);
        assert!(matches!(
            decrypt(encrypted, &other),
            Err(StoreError::Decryption)
        ));
    }

    #[test]
    fn classification_rejects_non_objects() {
        assert!(StoredRecord::from_value(json!("nope")).is_err());
        assert!(StoredRecord::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn envelope_value_roundtrip() {
        let value = json!({"id": "b1", "companyId": "c1", "payload": "AA==.AA=="});
        let record = StoredRecord::from_value(value.clone()).unwrap();
        assert!(matches!(record, StoredRecord::Encrypted(_)));
        assert_eq!(record.into_value(), value);
    }
}
