//! Envelope encryption for stored secrets.
//!
//! Every secret gets its own random data key.  The payload is sealed
//! under the data key, and the data key is sealed ("wrapped") under a
//! key derived from the process master key.  Only the wrapped form of a
//! data key is ever persisted.
//!
//! Wrapped keys and payloads are sealed with different associated data,
//! so one can never be accepted in place of the other.

use zeroize::Zeroizing;

use super::encryption::{open, seal};
use super::keys::{DataKey, MasterKey, KEY_LEN};
use crate::errors::{KeepError, Result};

const WRAP_AAD: &[u8] = b"secretkeep:data-key:v1";
const PAYLOAD_AAD: &[u8] = b"secretkeep:payload:v1";

/// Wraps/unwraps data keys and seals/opens payloads.
///
/// Holds only the derived wrapping key; built once at startup and
/// shared read-only across requests.
pub struct KeyEnvelope {
    wrap_key: Zeroizing<[u8; KEY_LEN]>,
}

impl KeyEnvelope {
    /// Build an envelope from the process master key.
    pub fn new(master_key: &MasterKey) -> Result<Self> {
        Ok(Self {
            wrap_key: master_key.derive_wrap_key()?,
        })
    }

    /// Generate a fresh data key and its wrapped form.
    ///
    /// Returns `(wrapped, raw)`: persist the first, use the second
    /// immediately and let it drop.
    pub fn generate_wrapped_key(&self) -> Result<(Vec<u8>, DataKey)> {
        let raw = DataKey::generate();
        let wrapped = seal(&self.wrap_key[..], raw.as_bytes(), WRAP_AAD)?;
        Ok((wrapped, raw))
    }

    /// Seal `plaintext` under a raw data key.
    pub fn encrypt(&self, key: &DataKey, plaintext: &[u8]) -> Result<Vec<u8>> {
        seal(key.as_bytes(), plaintext, PAYLOAD_AAD)
    }

    /// Unwrap the data key, then open and verify `ciphertext`.
    ///
    /// Fails closed with `DecryptionFailed` on any tampering of either
    /// input.
    pub fn decrypt(&self, wrapped_key: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let raw = Zeroizing::new(open(&self.wrap_key[..], wrapped_key, WRAP_AAD)?);
        let key = DataKey::from_slice(&raw)?;
        open(key.as_bytes(), ciphertext, PAYLOAD_AAD)
            .map(Zeroizing::new)
            .map_err(|_| KeepError::DecryptionFailed)
    }
}

impl std::fmt::Debug for KeyEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEnvelope").finish_non_exhaustive()
    }
}
