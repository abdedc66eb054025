//! Password verifiers using Argon2id.
//!
//! Account passwords are never stored.  Registration derives a salted
//! one-way verifier; login re-derives it with the stored salt and
//! parameters and compares in constant time.
//!
//! Encoded verifier layout (all on one line):
//!
//! ```text
//! argon2id$v=19$m=<kib>,t=<iterations>,p=<lanes>$<salt base64>$<hash base64>
//! ```

use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD_NO_PAD as BASE64;
use base64::Engine;
use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::errors::{KeepError, Result};

/// Length of the salt in bytes (128 bits).
const SALT_LEN: usize = 16;

/// Length of the derived hash in bytes (256 bits).
const HASH_LEN: usize = 32;

/// Minimum safe memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Prefix identifying the verifier scheme.
const SCHEME: &str = "argon2id";

/// Configurable Argon2id parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    /// Memory cost in KiB (default: 19 456 = 19 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 2).
    pub iterations: u32,
    /// Parallelism lanes (default: 1).
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl Argon2Params {
    /// Reject parameters too weak to be a meaningful verifier.
    pub fn validate(&self) -> Result<()> {
        if self.memory_kib < MIN_MEMORY_KIB {
            return Err(KeepError::KeyDerivationFailed(format!(
                "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
                self.memory_kib
            )));
        }
        if self.iterations < 1 {
            return Err(KeepError::KeyDerivationFailed(
                "Argon2 iterations must be at least 1".into(),
            ));
        }
        if self.parallelism < 1 {
            return Err(KeepError::KeyDerivationFailed(
                "Argon2 parallelism must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Run Argon2id over `password` and `salt`.
fn derive_hash(
    password: &[u8],
    salt: &[u8],
    params: &Argon2Params,
) -> Result<Zeroizing<[u8; HASH_LEN]>> {
    params.validate()?;

    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(HASH_LEN),
    )
    .map_err(|e| KeepError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut hash = Zeroizing::new([0u8; HASH_LEN]);
    argon2
        .hash_password_into(password, salt, &mut hash[..])
        .map_err(|e| KeepError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}")))?;

    Ok(hash)
}

/// Generate a cryptographically random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

/// Derive a fresh salted verifier for `password`.
pub fn hash_password(password: &str, params: &Argon2Params) -> Result<String> {
    let salt = generate_salt();
    let hash = derive_hash(password.as_bytes(), &salt, params)?;

    Ok(format!(
        "{SCHEME}$v=19$m={},t={},p={}${}${}",
        params.memory_kib,
        params.iterations,
        params.parallelism,
        BASE64.encode(salt),
        BASE64.encode(&hash[..]),
    ))
}

/// A verifier split into its parts.
struct ParsedVerifier {
    params: Argon2Params,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

fn parse_verifier(verifier: &str) -> Result<ParsedVerifier> {
    let malformed = || KeepError::KeyDerivationFailed("malformed password verifier".into());

    let mut parts = verifier.split('$');
    if parts.next() != Some(SCHEME) || parts.next() != Some("v=19") {
        return Err(malformed());
    }

    let mut params = Argon2Params {
        memory_kib: 0,
        iterations: 0,
        parallelism: 0,
    };
    for field in parts.next().ok_or_else(malformed)?.split(',') {
        let (name, value) = field.split_once('=').ok_or_else(malformed)?;
        let value: u32 = value.parse().map_err(|_| malformed())?;
        match name {
            "m" => params.memory_kib = value,
            "t" => params.iterations = value,
            "p" => params.parallelism = value,
            _ => return Err(malformed()),
        }
    }

    let salt = BASE64
        .decode(parts.next().ok_or_else(malformed)?)
        .map_err(|_| malformed())?;
    let hash = BASE64
        .decode(parts.next().ok_or_else(malformed)?)
        .map_err(|_| malformed())?;

    if parts.next().is_some() || hash.len() != HASH_LEN {
        return Err(malformed());
    }

    Ok(ParsedVerifier { params, salt, hash })
}

/// Check `password` against a stored verifier.
///
/// Returns `Ok(false)` on mismatch; errors only when the verifier
/// itself is unusable.
pub fn verify_password(password: &str, verifier: &str) -> Result<bool> {
    let parsed = parse_verifier(verifier)?;
    let candidate = derive_hash(password.as_bytes(), &parsed.salt, &parsed.params)?;
    Ok(candidate[..].ct_eq(&parsed.hash[..]).into())
}

/// Burn one derivation so unknown usernames cost as much as known ones.
pub fn dummy_verify(password: &str, params: &Argon2Params) {
    let salt = [0u8; SALT_LEN];
    let _ = derive_hash(password.as_bytes(), &salt, params);
}
