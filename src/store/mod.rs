//! Durable storage: accounts, secret metadata and sealed payloads.
//!
//! `SecretStore` owns a small pool of SQLite connections.  Each secret is
//! a metadata row in `secrets` plus exactly one payload row in the table
//! chosen by its data type; the two are always written, rewritten and
//! removed inside one transaction.
//!
//! Write transactions begin `IMMEDIATE` so they queue on SQLite's busy
//! handler instead of failing on a lock upgrade.
//!
//! Every public operation takes the caller's `Deadline`, stamped when
//! the request arrived.  Pool checkout and SQLite lock waits are bounded
//! by it, and a transaction whose deadline has passed is rolled back
//! rather than committed.  Internal bookkeeping (schema setup, audit
//! writes, pruning) runs under the store's own operation timeout.

pub mod audit;
mod pool;
mod schema;

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use crate::crypto::kdf::{self, Argon2Params};
use crate::errors::{KeepError, Result};
use crate::vault::{
    Account, AccountId, DataType, EncryptedPayload, SecretId, SecretMetadata, SecretUpdate,
};

pub use audit::{AuditEntry, AuditOutcome};
pub use pool::Deadline;
use pool::{ConnectionPool, PooledConnection};
use schema::payload_statements;

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Default timeout for the store's own bookkeeping.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default age after which audit entries are pruned.
pub const DEFAULT_AUDIT_RETENTION: Duration = Duration::from_secs(90 * 24 * 60 * 60);

const METADATA_COLUMNS: &str =
    "static_id, dynamic_id, name, description, data_type, owner_id, created_at, changed_at";

/// Where and how to open the store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database file, or `None` for a private in-memory database.
    pub path: Option<PathBuf>,
    pub pool_size: usize,
    pub op_timeout: Duration,
    /// Audit entries older than this are pruned; `None` keeps them all.
    pub audit_retention: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: DEFAULT_POOL_SIZE,
            op_timeout: DEFAULT_OP_TIMEOUT,
            audit_retention: Some(DEFAULT_AUDIT_RETENTION),
        }
    }
}

/// Current time at the precision timestamps are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// SQLite-backed persistence for the vault.
pub struct SecretStore {
    pool: ConnectionPool,
    op_timeout: Duration,
    audit_retention: Option<Duration>,
}

impl SecretStore {
    /// Open the store described by `config`, creating the schema if needed.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let pool = match &config.path {
            Some(path) => ConnectionPool::open(path, config.pool_size, config.op_timeout)?,
            None => ConnectionPool::in_memory(config.op_timeout)?,
        };
        let store = Self {
            pool,
            op_timeout: config.op_timeout,
            audit_retention: config.audit_retention,
        };
        store.init_schema()?;
        store.prune_audit()?;

        tracing::debug!(
            path = ?config.path,
            connections = store.pool.size(),
            "secret store opened"
        );
        Ok(store)
    }

    /// A private in-memory store with default settings.
    pub fn in_memory() -> Result<Self> {
        Self::open(&StoreConfig::default())
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn(&self.deadline())?;
        conn.execute_batch(schema::CREATE_SCHEMA)?;
        conn.pragma_update(None, "user_version", schema::SCHEMA_VERSION)?;
        Ok(())
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(self.op_timeout)
    }

    fn conn(&self, deadline: &Deadline) -> Result<PooledConnection> {
        self.pool.get(deadline)
    }

    /// Health check: one trivial round-trip.
    pub fn ping(&self, deadline: &Deadline) -> Result<()> {
        let conn = self.conn(deadline)?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    /// Insert a new account.  A taken username fails with `Conflict` and
    /// leaves nothing behind.
    pub fn create_account(
        &self,
        deadline: &Deadline,
        username: &str,
        verifier: &str,
    ) -> Result<Account> {
        let account = Account {
            id: AccountId::generate(),
            username: username.to_string(),
            password_verifier: verifier.to_string(),
        };

        let conn = self.conn(deadline)?;
        let inserted = conn.execute(
            "INSERT INTO accounts (id, username, password_verifier, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                account.id,
                account.username,
                account.password_verifier,
                format_ts(&now())
            ],
        );

        match inserted {
            Ok(_) => Ok(account),
            Err(e) if is_unique_violation(&e) => Err(KeepError::Conflict(format!(
                "username {username:?} is already registered"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up an account by exact username.
    pub fn find_account(&self, deadline: &Deadline, username: &str) -> Result<Option<Account>> {
        let conn = self.conn(deadline)?;
        let account = conn
            .query_row(
                "SELECT id, username, password_verifier FROM accounts WHERE username = ?1",
                params![username],
                |row| {
                    Ok(Account {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        password_verifier: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(account)
    }

    /// Check `password` against the stored verifier for `username`.
    ///
    /// `Ok(None)` means no such account or a wrong password; the two cost
    /// the same derivation.  `Err` is reserved for infrastructure faults.
    pub fn verify_account(
        &self,
        deadline: &Deadline,
        username: &str,
        password: &str,
        params: &Argon2Params,
    ) -> Result<Option<AccountId>> {
        match self.find_account(deadline, username)? {
            Some(account) => {
                if kdf::verify_password(password, &account.password_verifier)? {
                    Ok(Some(account.id))
                } else {
                    Ok(None)
                }
            }
            None => {
                kdf::dummy_verify(password, params);
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------
    // Secrets
    // ------------------------------------------------------------------

    /// Insert a secret's metadata row and its payload row together.
    pub fn create_secret(
        &self,
        deadline: &Deadline,
        meta: &SecretMetadata,
        payload: &EncryptedPayload,
    ) -> Result<()> {
        let mut conn = self.conn(deadline)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO secrets (static_id, dynamic_id, name, description, data_type,
                                  owner_id, created_at, changed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                meta.static_id,
                meta.dynamic_id,
                meta.name,
                meta.description,
                meta.data_type,
                meta.owner_id,
                format_ts(&meta.created_at),
                format_ts(&meta.changed_at),
            ],
        )?;
        tx.execute(
            payload_statements(meta.data_type).insert,
            params![meta.static_id, payload.ciphertext, payload.wrapped_key],
        )?;

        deadline.check()?;
        tx.commit()?;
        Ok(())
    }

    /// Metadata for `static_id`, whoever owns it.
    pub fn get_metadata(
        &self,
        deadline: &Deadline,
        static_id: &SecretId,
    ) -> Result<Option<SecretMetadata>> {
        let conn = self.conn(deadline)?;
        let meta = conn
            .query_row(
                &format!("SELECT {METADATA_COLUMNS} FROM secrets WHERE static_id = ?1"),
                params![static_id],
                metadata_from_row,
            )
            .optional()?;
        Ok(meta)
    }

    /// The sealed payload for `static_id` from the `data_type` table.
    pub fn read_payload(
        &self,
        deadline: &Deadline,
        static_id: &SecretId,
        data_type: DataType,
    ) -> Result<EncryptedPayload> {
        let conn = self.conn(deadline)?;
        conn.query_row(
            payload_statements(data_type).select,
            params![static_id],
            |row| {
                Ok(EncryptedPayload {
                    ciphertext: row.get(0)?,
                    wrapped_key: row.get(1)?,
                })
            },
        )
        .optional()?
        .ok_or(KeepError::NotFound)
    }

    /// Rewrite a secret owned by `owner`: new version marker, new
    /// name/description and a fully replaced payload row.
    ///
    /// A missing secret, a different owner and a different data type all
    /// fail with `NotFound`, and nothing is changed.
    pub fn edit_secret(
        &self,
        deadline: &Deadline,
        static_id: &SecretId,
        owner: &AccountId,
        update: &SecretUpdate,
        payload: &EncryptedPayload,
    ) -> Result<SecretMetadata> {
        let mut conn = self.conn(deadline)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = tx
            .query_row(
                &format!(
                    "SELECT {METADATA_COLUMNS} FROM secrets WHERE static_id = ?1 AND owner_id = ?2"
                ),
                params![static_id, owner],
                metadata_from_row,
            )
            .optional()?
            .ok_or(KeepError::NotFound)?;

        if current.data_type != update.data_type {
            return Err(KeepError::NotFound);
        }

        let updated = SecretMetadata {
            dynamic_id: SecretId::generate(),
            name: update.name.clone(),
            description: update.description.clone(),
            changed_at: now(),
            ..current
        };

        let rows = tx.execute(
            "UPDATE secrets SET dynamic_id = ?3, name = ?4, description = ?5, changed_at = ?6
             WHERE static_id = ?1 AND owner_id = ?2",
            params![
                static_id,
                owner,
                updated.dynamic_id,
                updated.name,
                updated.description,
                format_ts(&updated.changed_at),
            ],
        )?;
        expect_one_row(rows, "secrets")?;

        let rows = tx.execute(
            payload_statements(updated.data_type).update,
            params![static_id, payload.ciphertext, payload.wrapped_key],
        )?;
        expect_one_row(rows, updated.data_type.as_str())?;

        deadline.check()?;
        tx.commit()?;
        Ok(updated)
    }

    /// Remove a secret owned by `owner`, metadata and payload together.
    pub fn delete_secret(
        &self,
        deadline: &Deadline,
        static_id: &SecretId,
        owner: &AccountId,
    ) -> Result<()> {
        let mut conn = self.conn(deadline)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let data_type: DataType = tx
            .query_row(
                "SELECT data_type FROM secrets WHERE static_id = ?1 AND owner_id = ?2",
                params![static_id, owner],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(KeepError::NotFound)?;

        let rows = tx.execute(payload_statements(data_type).delete, params![static_id])?;
        expect_one_row(rows, data_type.as_str())?;

        let rows = tx.execute(
            "DELETE FROM secrets WHERE static_id = ?1 AND owner_id = ?2",
            params![static_id, owner],
        )?;
        expect_one_row(rows, "secrets")?;

        deadline.check()?;
        tx.commit()?;
        Ok(())
    }

    /// All metadata owned by `owner`, oldest first.
    pub fn list_metadata(
        &self,
        deadline: &Deadline,
        owner: &AccountId,
    ) -> Result<Vec<SecretMetadata>> {
        let conn = self.conn(deadline)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {METADATA_COLUMNS} FROM secrets
             WHERE owner_id = ?1
             ORDER BY created_at, static_id"
        ))?;
        let rows = stmt.query_map(params![owner], metadata_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore")
            .field("connections", &self.pool.size())
            .field("op_timeout", &self.op_timeout)
            .field("audit_retention", &self.audit_retention)
            .finish()
    }
}

fn metadata_from_row(row: &Row<'_>) -> rusqlite::Result<SecretMetadata> {
    Ok(SecretMetadata {
        static_id: row.get(0)?,
        dynamic_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        data_type: row.get(4)?,
        owner_id: row.get(5)?,
        created_at: parse_ts(row, 6)?,
        changed_at: parse_ts(row, 7)?,
    })
}

pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn expect_one_row(rows: usize, table: &str) -> Result<()> {
    if rows == 1 {
        Ok(())
    } else {
        Err(KeepError::Storage(format!(
            "expected one {table} row, statement touched {rows}"
        )))
    }
}
