use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::Argon2Params;
use crate::errors::{KeepError, Result};
use crate::store::StoreConfig;

/// Database path that selects a private in-memory store.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Server configuration.
///
/// Every field has a default so the server starts without a config file.
/// Values are layered: defaults, then an optional TOML file, then
/// command-line flags and environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_run_address")]
    pub run_address: String,

    /// Log level or `tracing` filter directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// SQLite database file (`:memory:` for a throwaway store).
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Number of pooled database connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// 32-byte master key used to wrap data keys.
    #[serde(default = "default_master_key_file")]
    pub master_key_file: PathBuf,

    /// 32-byte key used to sign session credentials.
    #[serde(default = "default_session_key_file")]
    pub session_key_file: PathBuf,

    /// Session lifetime in seconds (default: 3 hours).
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Per-request deadline in seconds; also bounds database waits.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Days to keep audit entries; `0` keeps them forever.
    #[serde(default = "default_audit_retention_days")]
    pub audit_retention_days: u64,

    /// Argon2 memory cost in KiB.
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count.
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree.
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_run_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("secretkeep.db")
}

fn default_pool_size() -> usize {
    crate::store::DEFAULT_POOL_SIZE
}

fn default_master_key_file() -> PathBuf {
    PathBuf::from("master.key")
}

fn default_session_key_file() -> PathBuf {
    PathBuf::from("session.key")
}

fn default_session_ttl_secs() -> u64 {
    crate::session::DEFAULT_TTL.as_secs()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_upload_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_audit_retention_days() -> u64 {
    90
}

fn default_argon2_memory_kib() -> u32 {
    Argon2Params::default().memory_kib
}

fn default_argon2_iterations() -> u32 {
    Argon2Params::default().iterations
}

fn default_argon2_parallelism() -> u32 {
    Argon2Params::default().parallelism
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            run_address: default_run_address(),
            log_level: default_log_level(),
            database_path: default_database_path(),
            pool_size: default_pool_size(),
            master_key_file: default_master_key_file(),
            session_key_file: default_session_key_file(),
            session_ttl_secs: default_session_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
            audit_retention_days: default_audit_retention_days(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.  Missing fields take defaults.
    pub fn load(config_path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            KeepError::Config(format!("Failed to read {}: {e}", config_path.display()))
        })?;

        toml::from_str(&contents).map_err(|e| {
            KeepError::Config(format!("Failed to parse {}: {e}", config_path.display()))
        })
    }

    /// Load from `config_path` when given, defaults otherwise.
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(KeepError::Config("pool_size must be at least 1".into()));
        }
        if self.session_ttl_secs == 0 {
            return Err(KeepError::Config("session_ttl_secs must be positive".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(KeepError::Config(
                "request_timeout_secs must be positive".into(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(KeepError::Config("max_upload_bytes must be positive".into()));
        }
        self.argon2_params().validate()
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Storage settings for `SecretStore::open`.
    pub fn store_config(&self) -> StoreConfig {
        let path = if self.database_path.as_os_str() == IN_MEMORY_DATABASE {
            None
        } else {
            Some(self.database_path.clone())
        };
        StoreConfig {
            path,
            pool_size: self.pool_size,
            op_timeout: self.request_timeout(),
            audit_retention: self.audit_retention(),
        }
    }

    /// Audit retention window, or `None` to keep every entry.
    pub fn audit_retention(&self) -> Option<Duration> {
        (self.audit_retention_days > 0)
            .then(|| Duration::from_secs(self.audit_retention_days.saturating_mul(24 * 60 * 60)))
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn argon2_params(&self) -> Argon2Params {
        Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.run_address, "127.0.0.1:8080");
        assert_eq!(s.log_level, "info");
        assert_eq!(s.session_ttl_secs, 3 * 60 * 60);
        assert_eq!(s.argon2_memory_kib, 19_456);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keep.toml");
        let config = r#"
run_address = "0.0.0.0:9000"
database_path = "/var/lib/keep/keep.db"
pool_size = 8
argon2_memory_kib = 65536
"#;
        fs::write(&path, config).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.run_address, "0.0.0.0:9000");
        assert_eq!(settings.database_path, PathBuf::from("/var/lib/keep/keep.db"));
        assert_eq!(settings.pool_size, 8);
        assert_eq!(settings.argon2_memory_kib, 65_536);
        // Rest should be defaults
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.argon2_iterations, 2);
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keep.toml");
        fs::write(&path, "not valid {{toml").unwrap();
        assert!(matches!(Settings::load(&path), Err(KeepError::Config(_))));
    }

    #[test]
    fn load_errors_on_missing_file() {
        let tmp = TempDir::new().unwrap();
        assert!(Settings::load(&tmp.path().join("absent.toml")).is_err());
        assert!(Settings::load_or_default(None).is_ok());
    }

    #[test]
    fn memory_database_maps_to_no_path() {
        let s = Settings {
            database_path: PathBuf::from(IN_MEMORY_DATABASE),
            ..Settings::default()
        };
        assert!(s.store_config().path.is_none());
        assert!(Settings::default().store_config().path.is_some());
    }

    #[test]
    fn validate_rejects_zero_values() {
        let s = Settings {
            pool_size: 0,
            ..Settings::default()
        };
        assert!(s.validate().is_err());

        let s = Settings {
            argon2_memory_kib: 16,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn zero_retention_keeps_audit_forever() {
        assert_eq!(
            Settings::default().audit_retention(),
            Some(Duration::from_secs(90 * 24 * 60 * 60))
        );
        let s = Settings {
            audit_retention_days: 0,
            ..Settings::default()
        };
        assert!(s.store_config().audit_retention.is_none());
    }
}
