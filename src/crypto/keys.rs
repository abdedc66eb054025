//! Key material held in memory and HKDF-SHA256 sub-key derivation.
//!
//! The process-wide master key is never used directly for encryption.
//! HKDF (RFC 5869) derives a dedicated key-wrapping key from it so the
//! master key and the keys it protects stay cryptographically separate.

use aes_gcm::aead::{KeyInit, OsRng};
use aes_gcm::Aes256Gcm;
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{KeepError, Result};

/// Length of all symmetric keys (256 bits).
pub const KEY_LEN: usize = 32;

/// HKDF `info` label for the data-key wrapping key.
const WRAP_KEY_INFO: &[u8] = b"secretkeep-key-wrap";

/// Internal helper: run HKDF-SHA256 expand with the given `info`.
fn hkdf_derive(ikm: &[u8], info: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(info, &mut okm[..])
        .map_err(|e| KeepError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

/// Derive the key used to wrap per-secret data keys.
pub fn derive_wrap_key(master_key: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    hkdf_derive(master_key, WRAP_KEY_INFO)
}

/// The 32-byte process master key.  Zeroed when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Build a master key from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Build a master key from a slice that must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            KeepError::KeyfileError(format!(
                "master key must be exactly {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::new(arr))
    }

    /// Derive the data-key wrapping key from this master key.
    pub fn derive_wrap_key(&self) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        derive_wrap_key(&self.bytes)
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// A raw per-secret data key.  Only ever lives for a single request.
pub struct DataKey(Zeroizing<[u8; KEY_LEN]>);

impl DataKey {
    /// Generate a fresh random data key.
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(key.as_slice());
        Self(bytes)
    }

    /// Rebuild a data key from unwrapped bytes.
    pub(crate) fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(KeepError::DecryptionFailed);
        }
        let mut arr = Zeroizing::new([0u8; KEY_LEN]);
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataKey(..)")
    }
}
