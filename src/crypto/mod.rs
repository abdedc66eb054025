//! Cryptographic primitives for SecretKeep.
//!
//! This module provides:
//! - AES-256-GCM sealing with associated data (`encryption`)
//! - Per-secret envelope encryption under the master key (`envelope`)
//! - Argon2id password verifiers (`kdf`)
//! - Key file generation and loading (`keyfile`)
//! - In-memory key types and HKDF sub-key derivation (`keys`)

pub mod encryption;
pub mod envelope;
pub mod kdf;
pub mod keyfile;
pub mod keys;

pub use encryption::{open, seal};
pub use envelope::KeyEnvelope;
pub use kdf::{hash_password, verify_password, Argon2Params};
pub use keyfile::{generate_keyfile, load_keyfile};
pub use keys::{DataKey, MasterKey};
