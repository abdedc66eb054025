//! Typed plaintext payloads and their validation.
//!
//! Payloads are opaque bytes to the storage and crypto layers.  Before
//! they are sealed, the shape expected for each data type is checked
//! here so a malformed secret is rejected as a bad request.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::model::DataType;
use crate::errors::{KeepError, Result};

/// A stored login/password pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

/// A stored payment card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardData {
    pub card_number: String,
    pub expired_at: String,
    pub cardholder_name: String,
    pub code: String,
}

/// A stored file: original name, size and contents (base64 in JSON).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileData {
    pub name: String,
    pub size: u64,
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub data: Vec<u8>,
}

impl FileData {
    /// Wrap uploaded bytes under their original file name.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: data.len() as u64,
            data,
        }
    }

    /// Encode as the payload bytes stored for a `files` secret.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| KeepError::Serialization(format!("file payload: {e}")))
    }
}

/// Check that `payload` has the shape expected for `data_type`.
pub fn validate(data_type: DataType, payload: &[u8]) -> Result<()> {
    let parsed = match data_type {
        DataType::Passwords => serde_json::from_slice::<Credentials>(payload).map(|_| ()),
        DataType::Cards => serde_json::from_slice::<CardData>(payload).map(|_| ()),
        DataType::Files => serde_json::from_slice::<FileData>(payload).map(|_| ()),
    };
    parsed.map_err(|e| KeepError::Validation(format!("malformed {data_type} payload: {e}")))
}

fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&BASE64.encode(data))
}

fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_validate() {
        let ok = br#"{"login":"alice","password":"hunter2"}"#;
        assert!(validate(DataType::Passwords, ok).is_ok());
        assert!(validate(DataType::Passwords, b"alice:hunter2").is_err());
        assert!(validate(DataType::Cards, ok).is_err());
    }

    #[test]
    fn card_validate() {
        let card = CardData {
            card_number: "4111111111111111".into(),
            expired_at: "12/29".into(),
            cardholder_name: "ALICE".into(),
            code: "123".into(),
        };
        let bytes = serde_json::to_vec(&card).unwrap();
        assert!(validate(DataType::Cards, &bytes).is_ok());
    }

    #[test]
    fn file_payload_is_binary_safe() {
        let file = FileData::new("blob.bin", vec![0, 159, 255, 10]);
        assert_eq!(file.size, 4);

        let bytes = file.to_payload().unwrap();
        assert!(validate(DataType::Files, &bytes).is_ok());

        let back: FileData = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, file);
    }
}
