//! Signed, time-limited session credentials.
//!
//! A credential is two base64url segments joined by a dot:
//!
//! ```text
//! base64url(claims JSON) . base64url(HMAC-SHA256(session_key, first segment))
//! ```
//!
//! The claims carry the account id and an expiry.  The signature is
//! verified in constant time before the claims are trusted.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64URL;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::errors::{KeepError, Result};
use crate::vault::AccountId;

/// Name of the cookie carrying the session credential.
pub const SESSION_COOKIE: &str = "auth_token";

/// Default credential lifetime (3 hours).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3 * 60 * 60);

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: AccountId,
    iat: i64,
    exp: i64,
}

/// Issues and validates session credentials with a server-held key.
pub struct SessionAuthority {
    signing_key: Zeroizing<Vec<u8>>,
    ttl: Duration,
}

impl SessionAuthority {
    /// Build an authority from the signing key loaded at startup.
    pub fn new(signing_key: &[u8], ttl: Duration) -> Result<Self> {
        if signing_key.len() < 32 {
            return Err(KeepError::KeyfileError(
                "session signing key must be at least 32 bytes".into(),
            ));
        }
        if ttl.is_zero() {
            return Err(KeepError::Config("session TTL must be positive".into()));
        }
        Ok(Self {
            signing_key: Zeroizing::new(signing_key.to_vec()),
            ttl,
        })
    }

    /// Credential lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a credential for `account` valid from now.
    pub fn issue(&self, account: &AccountId) -> Result<String> {
        self.issue_at(account, Utc::now())
    }

    /// Issue a credential as if the current time were `now`.
    pub fn issue_at(&self, account: &AccountId, now: DateTime<Utc>) -> Result<String> {
        let ttl = i64::try_from(self.ttl.as_secs())
            .map_err(|_| KeepError::Config("session TTL too large".into()))?;
        let claims = Claims {
            sub: account.clone(),
            iat: now.timestamp(),
            exp: now.timestamp().saturating_add(ttl),
        };
        let claims_json = serde_json::to_vec(&claims)
            .map_err(|e| KeepError::Serialization(format!("session claims: {e}")))?;

        let claims_part = B64URL.encode(claims_json);
        let signature = B64URL.encode(self.sign(claims_part.as_bytes())?);
        Ok(format!("{claims_part}.{signature}"))
    }

    /// Validate a credential and return the account it was issued to.
    pub fn validate(&self, token: &str) -> Result<AccountId> {
        self.validate_at(token, Utc::now())
    }

    /// Validate a credential as if the current time were `now`.
    ///
    /// Malformed, forged and expired credentials all fail with
    /// `Unauthorized`.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<AccountId> {
        let (claims_part, signature_part) =
            token.split_once('.').ok_or(KeepError::Unauthorized)?;
        let signature = B64URL
            .decode(signature_part)
            .map_err(|_| KeepError::Unauthorized)?;

        let mut mac = self.mac()?;
        mac.update(claims_part.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| KeepError::Unauthorized)?;

        let claims_json = B64URL
            .decode(claims_part)
            .map_err(|_| KeepError::Unauthorized)?;
        let claims: Claims =
            serde_json::from_slice(&claims_json).map_err(|_| KeepError::Unauthorized)?;

        if now.timestamp() >= claims.exp {
            return Err(KeepError::Unauthorized);
        }

        Ok(claims.sub)
    }

    /// `Set-Cookie` value carrying `token`.
    pub fn cookie(&self, token: &str) -> String {
        format!(
            "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
            self.ttl.as_secs()
        )
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| KeepError::KeyfileError(format!("invalid session key: {e}")))
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl std::fmt::Debug for SessionAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthority")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> SessionAuthority {
        SessionAuthority::new(&[7u8; 32], DEFAULT_TTL).unwrap()
    }

    #[test]
    fn issued_token_validates_to_same_account() {
        let auth = authority();
        let id = AccountId::generate();
        let token = auth.issue(&id).unwrap();
        assert_eq!(auth.validate(&token).unwrap(), id);
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = authority();
        let id = AccountId::generate();
        let issued = Utc::now() - chrono::Duration::hours(4);
        let token = auth.issue_at(&id, issued).unwrap();

        assert!(matches!(auth.validate(&token), Err(KeepError::Unauthorized)));
        // Still valid just before expiry.
        let just_before = issued + chrono::Duration::seconds(DEFAULT_TTL.as_secs() as i64 - 1);
        assert_eq!(auth.validate_at(&token, just_before).unwrap(), id);
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() {
        let other = SessionAuthority::new(&[8u8; 32], DEFAULT_TTL).unwrap();
        let token = other.issue(&AccountId::generate()).unwrap();
        assert!(authority().validate(&token).is_err());
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let auth = authority();
        let token = auth.issue(&AccountId::generate()).unwrap();
        let (_, sig) = token.split_once('.').unwrap();

        let forged_claims = Claims {
            sub: AccountId::generate(),
            iat: 0,
            exp: i64::MAX,
        };
        let forged = format!(
            "{}.{sig}",
            B64URL.encode(serde_json::to_vec(&forged_claims).unwrap())
        );
        assert!(auth.validate(&forged).is_err());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let auth = authority();
        for bad in ["", "abc", "a.b", "..", "not base64!.x"] {
            assert!(auth.validate(bad).is_err(), "{bad:?} should fail");
        }
    }

    #[test]
    fn short_signing_key_is_rejected() {
        assert!(SessionAuthority::new(&[1u8; 8], DEFAULT_TTL).is_err());
    }

    #[test]
    fn cookie_carries_ttl_and_flags() {
        let cookie = authority().cookie("tok");
        assert!(cookie.starts_with("auth_token=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=10800"));
    }
}
