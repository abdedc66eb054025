//! Vault domain: the data model, typed payloads and the operations that
//! tie crypto, sessions and storage together.
//!
//! - `model`: identifiers, `DataType`, accounts and secret metadata
//! - `payload`: plaintext payload shapes and their validation
//! - `service`: `Vault`, the transport-independent use cases

pub mod model;
pub mod payload;
pub mod service;

pub use model::{
    Account, AccountId, DataType, EncryptedPayload, SecretId, SecretMetadata, SecretUpdate,
};
pub use payload::{CardData, Credentials, FileData};
pub use service::{NewSecret, SecretPlaintext, Session, Vault};
