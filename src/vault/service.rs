//! Vault use cases: register, login and the secret lifecycle.
//!
//! `Vault` is independent of any transport.  It validates input, derives
//! password verifiers, drives envelope encryption and delegates
//! persistence to `SecretStore`.  Every operation runs to completion on
//! the calling thread; async callers should wrap it in `spawn_blocking`.
//!
//! Every operation takes the request's `Deadline` and passes it to each
//! store call, so a request that has run out of time stops before it
//! commits anything.
//!
//! Ownership is always "metadata owner == authenticated account".  A
//! secret owned by someone else is reported exactly like a missing one.

use zeroize::Zeroizing;

use super::model::{AccountId, DataType, EncryptedPayload, SecretId, SecretMetadata, SecretUpdate};
use super::payload;
use crate::crypto::kdf::{self, Argon2Params};
use crate::crypto::KeyEnvelope;
use crate::errors::{KeepError, Result};
use crate::session::SessionAuthority;
use crate::store::{self, AuditEntry, AuditOutcome, Deadline, SecretStore};

const MAX_USERNAME_CHARS: usize = 128;
const MAX_NAME_CHARS: usize = 256;
const MAX_DESCRIPTION_CHARS: usize = 4096;

/// A freshly issued session for an account.
#[derive(Debug, Clone)]
pub struct Session {
    pub account_id: AccountId,
    pub token: String,
}

/// Client-supplied fields of a new secret.
#[derive(Debug, Clone)]
pub struct NewSecret {
    pub name: String,
    pub description: String,
    pub data_type: DataType,
}

/// A decrypted secret.  The plaintext is wiped when dropped.
pub struct SecretPlaintext {
    pub metadata: SecretMetadata,
    pub data: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for SecretPlaintext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretPlaintext")
            .field("metadata", &self.metadata)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// The vault: stateless per request, shared across all of them.
pub struct Vault {
    store: SecretStore,
    envelope: KeyEnvelope,
    sessions: SessionAuthority,
    argon2: Argon2Params,
}

impl Vault {
    pub fn new(
        store: SecretStore,
        envelope: KeyEnvelope,
        sessions: SessionAuthority,
        argon2: Argon2Params,
    ) -> Result<Self> {
        argon2.validate()?;
        Ok(Self {
            store,
            envelope,
            sessions,
            argon2,
        })
    }

    /// The session authority used to issue and check credentials.
    pub fn sessions(&self) -> &SessionAuthority {
        &self.sessions
    }

    /// Health check against the backing store.
    pub fn ping(&self, deadline: &Deadline) -> Result<()> {
        self.store.ping(deadline)
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    /// Create an account and open a session for it.
    pub fn register(&self, deadline: &Deadline, username: &str, password: &str) -> Result<Session> {
        validate_username(username)?;
        if password.is_empty() {
            return Err(KeepError::Validation("password must not be empty".into()));
        }

        let verifier = kdf::hash_password(password, &self.argon2)?;
        let account = match self.store.create_account(deadline, username, &verifier) {
            Ok(account) => account,
            Err(e) => {
                self.store.log_audit(None, "register", None, outcome_of(&e));
                return Err(e);
            }
        };

        tracing::info!(username, account = %account.id, "account registered");
        self.store
            .log_audit(Some(&account.id), "register", None, AuditOutcome::Success);

        let token = self.sessions.issue(&account.id)?;
        Ok(Session {
            account_id: account.id,
            token,
        })
    }

    /// Check credentials and open a session.
    ///
    /// Unknown usernames and wrong passwords both fail with
    /// `Unauthorized`.
    pub fn login(&self, deadline: &Deadline, username: &str, password: &str) -> Result<Session> {
        let account_id = self
            .store
            .verify_account(deadline, username, password, &self.argon2)?;

        let Some(account_id) = account_id else {
            tracing::info!(username, "login rejected");
            self.store
                .log_audit(None, "login", None, AuditOutcome::Denied);
            return Err(KeepError::Unauthorized);
        };

        tracing::info!(username, account = %account_id, "login succeeded");
        self.store
            .log_audit(Some(&account_id), "login", None, AuditOutcome::Success);

        let token = self.sessions.issue(&account_id)?;
        Ok(Session { account_id, token })
    }

    // ------------------------------------------------------------------
    // Secrets
    // ------------------------------------------------------------------

    /// Encrypt and store a new secret; returns its metadata.
    pub fn create_secret(
        &self,
        deadline: &Deadline,
        owner: &AccountId,
        secret: NewSecret,
        plaintext: &[u8],
    ) -> Result<SecretMetadata> {
        validate_fields(&secret.name, &secret.description)?;
        payload::validate(secret.data_type, plaintext)?;

        let sealed = self.seal(plaintext)?;
        let ts = store::now();
        let meta = SecretMetadata {
            static_id: SecretId::generate(),
            dynamic_id: SecretId::generate(),
            name: secret.name,
            description: secret.description,
            data_type: secret.data_type,
            owner_id: owner.clone(),
            created_at: ts,
            changed_at: ts,
        };

        let result = self.store.create_secret(deadline, &meta, &sealed);
        self.audit(owner, "create", &meta.static_id, &result);
        result?;

        tracing::debug!(account = %owner, static_id = %meta.static_id, data_type = %meta.data_type, "secret created");
        Ok(meta)
    }

    /// Fetch and decrypt a secret owned by `owner`.
    pub fn read_secret(
        &self,
        deadline: &Deadline,
        owner: &AccountId,
        static_id: &SecretId,
    ) -> Result<SecretPlaintext> {
        let metadata = self
            .store
            .get_metadata(deadline, static_id)?
            .filter(|meta| &meta.owner_id == owner)
            .ok_or(KeepError::NotFound)?;

        let sealed = self
            .store
            .read_payload(deadline, static_id, metadata.data_type)?;
        let data = self
            .envelope
            .decrypt(&sealed.wrapped_key, &sealed.ciphertext)
            .map_err(|e| {
                tracing::error!(static_id = %static_id, error = %e, "stored secret failed to decrypt");
                e
            })?;

        Ok(SecretPlaintext { metadata, data })
    }

    /// Replace a secret's name, description and payload.
    ///
    /// The payload is sealed under a newly generated data key, and the
    /// returned metadata carries a new `dynamic_id`.
    pub fn edit_secret(
        &self,
        deadline: &Deadline,
        owner: &AccountId,
        static_id: &SecretId,
        update: SecretUpdate,
        plaintext: &[u8],
    ) -> Result<SecretMetadata> {
        validate_fields(&update.name, &update.description)?;
        payload::validate(update.data_type, plaintext)?;

        let sealed = self.seal(plaintext)?;
        let result = self
            .store
            .edit_secret(deadline, static_id, owner, &update, &sealed);
        self.audit(owner, "edit", static_id, &result);

        let meta = result?;
        tracing::debug!(account = %owner, static_id = %static_id, dynamic_id = %meta.dynamic_id, "secret edited");
        Ok(meta)
    }

    /// Delete a secret owned by `owner`.
    pub fn delete_secret(
        &self,
        deadline: &Deadline,
        owner: &AccountId,
        static_id: &SecretId,
    ) -> Result<()> {
        let result = self.store.delete_secret(deadline, static_id, owner);
        self.audit(owner, "delete", static_id, &result);
        result?;

        tracing::debug!(account = %owner, static_id = %static_id, "secret deleted");
        Ok(())
    }

    /// All metadata owned by `owner`.  Empty when there is none.
    pub fn list_metadata(
        &self,
        deadline: &Deadline,
        owner: &AccountId,
    ) -> Result<Vec<SecretMetadata>> {
        self.store.list_metadata(deadline, owner)
    }

    /// Recent audit entries for `owner`, newest first.
    pub fn audit_entries(
        &self,
        deadline: &Deadline,
        owner: &AccountId,
        limit: usize,
    ) -> Result<Vec<AuditEntry>> {
        self.store.audit_entries(deadline, owner, limit)
    }

    /// Drop audit entries past the retention window.
    pub fn prune_audit(&self) -> Result<usize> {
        self.store.prune_audit()
    }

    fn seal(&self, plaintext: &[u8]) -> Result<EncryptedPayload> {
        let (wrapped_key, key) = self.envelope.generate_wrapped_key()?;
        let ciphertext = self.envelope.encrypt(&key, plaintext)?;
        Ok(EncryptedPayload {
            ciphertext,
            wrapped_key,
        })
    }

    fn audit<T>(&self, owner: &AccountId, operation: &str, static_id: &SecretId, result: &Result<T>) {
        let outcome = match result {
            Ok(_) => AuditOutcome::Success,
            Err(e) => outcome_of(e),
        };
        self.store
            .log_audit(Some(owner), operation, Some(static_id), outcome);
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("store", &self.store)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

fn outcome_of(err: &KeepError) -> AuditOutcome {
    match err {
        KeepError::Unauthorized | KeepError::NotFound | KeepError::Conflict(_) => {
            AuditOutcome::Denied
        }
        _ => AuditOutcome::Failed,
    }
}

fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if len == 0 || len > MAX_USERNAME_CHARS {
        return Err(KeepError::Validation(format!(
            "username must be 1 to {MAX_USERNAME_CHARS} characters"
        )));
    }
    if username.chars().any(char::is_control) {
        return Err(KeepError::Validation(
            "username must not contain control characters".into(),
        ));
    }
    Ok(())
}

fn validate_fields(name: &str, description: &str) -> Result<()> {
    let name_len = name.chars().count();
    if name_len == 0 || name_len > MAX_NAME_CHARS {
        return Err(KeepError::Validation(format!(
            "name must be 1 to {MAX_NAME_CHARS} characters"
        )));
    }
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(KeepError::Validation(format!(
            "description must be at most {MAX_DESCRIPTION_CHARS} characters"
        )));
    }
    Ok(())
}
