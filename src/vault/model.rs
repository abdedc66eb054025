//! Accounts, secret metadata and encrypted payload rows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{KeepError, Result};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse an identifier received from a client.
            pub fn parse(s: &str) -> Result<Self> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| KeepError::Validation(format!("invalid {}: {s:?}", stringify!($name))))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0.to_string()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                Uuid::parse_str(text)
                    .map(Self)
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

uuid_id!(
    /// Identity of an account.  Immutable once created.
    AccountId
);

uuid_id!(
    /// Identifier of a secret: `static_id` for its lifetime, `dynamic_id`
    /// for each version.
    SecretId
);

/// The kind of secret, which also selects the payload table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Passwords,
    Cards,
    Files,
}

impl DataType {
    /// All data types, in table-creation order.
    pub const ALL: [DataType; 3] = [DataType::Passwords, DataType::Cards, DataType::Files];

    /// Wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Passwords => "passwords",
            DataType::Cards => "cards",
            DataType::Files => "files",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = KeepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "passwords" => Ok(DataType::Passwords),
            "cards" => Ok(DataType::Cards),
            "files" => Ok(DataType::Files),
            other => Err(KeepError::Validation(format!("unknown data_type {other:?}"))),
        }
    }
}

impl ToSql for DataType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for DataType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: KeepError| FromSqlError::Other(Box::new(e)))
    }
}

/// A registered account.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    /// Salted Argon2id verifier; never the password itself.
    pub password_verifier: String,
}

/// The "info" record describing a secret.  Never carries payload data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMetadata {
    pub static_id: SecretId,
    pub dynamic_id: SecretId,
    pub name: String,
    pub description: String,
    pub data_type: DataType,
    #[serde(rename = "user_id")]
    pub owner_id: AccountId,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "changed")]
    pub changed_at: DateTime<Utc>,
}

/// The sealed payload row for a secret.
#[derive(Clone)]
pub struct EncryptedPayload {
    pub ciphertext: Vec<u8>,
    pub wrapped_key: Vec<u8>,
}

impl fmt::Debug for EncryptedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedPayload")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("wrapped_key_len", &self.wrapped_key.len())
            .finish()
    }
}

/// Fields a client may change in an edit.
#[derive(Debug, Clone)]
pub struct SecretUpdate {
    pub name: String,
    pub description: String,
    pub data_type: DataType,
}
