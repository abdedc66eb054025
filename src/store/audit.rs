//! Audit trail of account and secret operations.
//!
//! Rows live in the `audit_log` table next to the vault data.  Writing an
//! entry never fails the operation being recorded: errors are logged and
//! dropped.  Entries older than the configured retention are pruned when
//! the store opens and on each `prune_audit` call.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;

use super::{format_ts, now, parse_ts, Deadline, SecretStore};
use crate::errors::{KeepError, Result};
use crate::vault::{AccountId, SecretId};

/// Default number of entries returned by a query.
pub const DEFAULT_AUDIT_LIMIT: usize = 50;

/// How a recorded operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Denied,
    Failed,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Denied => "denied",
            AuditOutcome::Failed => "failed",
        }
    }
}

/// A single audit log entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub account_id: Option<AccountId>,
    pub operation: String,
    pub static_id: Option<SecretId>,
    pub outcome: String,
}

impl SecretStore {
    /// Record an operation.  Fire-and-forget.
    pub fn log_audit(
        &self,
        account: Option<&AccountId>,
        operation: &str,
        static_id: Option<&SecretId>,
        outcome: AuditOutcome,
    ) {
        let result = self.conn(&self.deadline()).and_then(|conn| {
            conn.execute(
                "INSERT INTO audit_log (timestamp, account_id, operation, static_id, outcome)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    format_ts(&now()),
                    account,
                    operation,
                    static_id,
                    outcome.as_str()
                ],
            )
            .map_err(Into::into)
        });

        if let Err(e) = result {
            tracing::warn!(operation, error = %e, "failed to write audit entry");
        }
    }

    /// Most recent entries for `account`, newest first.
    pub fn audit_entries(
        &self,
        deadline: &Deadline,
        account: &AccountId,
        limit: usize,
    ) -> Result<Vec<AuditEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.conn(deadline)?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, account_id, operation, static_id, outcome
             FROM audit_log
             WHERE account_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![account, limit], |row| {
            Ok(AuditEntry {
                id: row.get(0)?,
                timestamp: parse_ts(row, 1)?,
                account_id: row.get(2)?,
                operation: row.get(3)?,
                static_id: row.get(4)?,
                outcome: row.get(5)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Delete entries older than the retention window.  Returns how many
    /// were removed.
    pub fn prune_audit(&self) -> Result<usize> {
        let Some(retention) = self.audit_retention else {
            return Ok(0);
        };
        let retention = chrono::Duration::from_std(retention)
            .map_err(|e| KeepError::Config(format!("audit retention out of range: {e}")))?;
        let cutoff = now()
            .checked_sub_signed(retention)
            .ok_or_else(|| KeepError::Config("audit retention out of range".into()))?;
        self.prune_audit_before(cutoff)
    }

    fn prune_audit_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn(&self.deadline())?;
        let removed = conn.execute(
            "DELETE FROM audit_log WHERE timestamp < ?1",
            params![format_ts(&cutoff)],
        )?;
        if removed > 0 {
            tracing::info!(removed, "pruned audit entries");
        }
        Ok(removed)
    }
}
