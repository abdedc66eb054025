//! SQLite connection pooling with deadline-bounded checkout.
//!
//! Connections come from an `r2d2` pool over `r2d2_sqlite`.  A `Deadline`
//! is stamped once per request and handed down to every store call; it
//! bounds how long checkout may wait and becomes the connection's busy
//! timeout, so lock waits end with the request.

use std::path::Path;
use std::time::{Duration, Instant};

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::errors::{KeepError, Result};

/// A connection on loan from the pool; returned when dropped.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Point in time after which an operation must give up.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Time left, or `None` once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .checked_duration_since(Instant::now())
            .filter(|d| !d.is_zero())
    }

    /// Fail with `Timeout` once the deadline has passed.
    pub fn check(&self) -> Result<()> {
        self.remaining().map(|_| ()).ok_or(KeepError::Timeout)
    }
}

/// Pool of open connections to one database.
pub struct ConnectionPool {
    inner: r2d2::Pool<SqliteConnectionManager>,
}

impl ConnectionPool {
    /// Open up to `size` connections to the database file at `path`.
    ///
    /// `connect_timeout` bounds how long opening the initial connections
    /// may take.
    pub fn open(path: &Path, size: usize, connect_timeout: Duration) -> Result<Self> {
        let size = u32::try_from(size)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| KeepError::Config("pool size must be between 1 and 2^32-1".into()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            // WAL lets readers proceed while a writer holds the lock.
            conn.pragma_update(None, "journal_mode", "WAL")?;
            configure(conn)
        });
        let inner = r2d2::Pool::builder()
            .max_size(size)
            .connection_timeout(connect_timeout)
            .build(manager)
            .map_err(|e| KeepError::Storage(format!("cannot open {}: {e}", path.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            if let Err(e) = std::fs::set_permissions(path, perms) {
                tracing::warn!(path = %path.display(), error = %e, "cannot restrict database file permissions");
            }
        }

        Ok(Self { inner })
    }

    /// A single private in-memory database.
    ///
    /// Every in-memory connection is its own database, so the pool holds
    /// exactly one and never retires it.
    pub fn in_memory(connect_timeout: Duration) -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(configure);
        let inner = r2d2::Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_timeout(connect_timeout)
            .build(manager)
            .map_err(|e| KeepError::Storage(format!("cannot open in-memory database: {e}")))?;
        Ok(Self { inner })
    }

    /// Number of connections the pool may hold.
    pub fn size(&self) -> usize {
        self.inner.max_size() as usize
    }

    /// Check out a connection, waiting at most until `deadline`.
    ///
    /// The connection's busy timeout is set to the time remaining so
    /// lock waits inside the operation are bounded by the same deadline.
    pub fn get(&self, deadline: &Deadline) -> Result<PooledConnection> {
        let remaining = deadline.remaining().ok_or(KeepError::Timeout)?;
        let conn = self.inner.get_timeout(remaining).map_err(|e| {
            tracing::debug!(error = %e, "connection checkout timed out");
            KeepError::Timeout
        })?;

        conn.busy_timeout(deadline.remaining().ok_or(KeepError::Timeout)?)?;
        Ok(conn)
    }
}

fn configure(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "secure_delete", "ON")?;
    Ok(())
}
