//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Args, Parser};

use crate::config::Settings;
use crate::errors::Result;

/// SecretKeep: multi-user encrypted secret vault server.
#[derive(Parser)]
#[command(
    name = "secretkeep",
    about = "Multi-user encrypted secret vault server",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve(ServeArgs),

    /// Generate a new random 32-byte key file
    GenKey {
        /// Where to write the key file
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Flags for `secretkeep serve`.  Each one overrides the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on (e.g. 127.0.0.1:8080)
    #[arg(short = 'a', long, env = "RUN_ADDRESS")]
    pub run_address: Option<String>,

    /// Log level or filter directive
    #[arg(short = 'l', long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// SQLite database path (`:memory:` for a throwaway store)
    #[arg(short = 'd', long = "database", env = "DATABASE_URI")]
    pub database_path: Option<PathBuf>,

    /// Number of pooled database connections
    #[arg(long, env = "KEEP_POOL_SIZE")]
    pub pool_size: Option<usize>,

    /// Master key file (32 bytes)
    #[arg(long = "master-key", env = "KEEP_MASTER_KEY_FILE")]
    pub master_key_file: Option<PathBuf>,

    /// Session signing key file (32 bytes)
    #[arg(long = "session-key", env = "KEEP_SESSION_KEY_FILE")]
    pub session_key_file: Option<PathBuf>,

    /// Session lifetime in seconds
    #[arg(long = "session-ttl", env = "KEEP_SESSION_TTL")]
    pub session_ttl_secs: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long = "request-timeout")]
    pub request_timeout_secs: Option<u64>,

    /// Largest accepted request body in bytes
    #[arg(long = "max-upload")]
    pub max_upload_bytes: Option<usize>,
}

impl ServeArgs {
    /// Resolve settings: defaults, then the config file, then these flags.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load_or_default(self.config.as_deref())?;

        if let Some(v) = &self.run_address {
            settings.run_address = v.clone();
        }
        if let Some(v) = &self.log_level {
            settings.log_level = v.clone();
        }
        if let Some(v) = &self.database_path {
            settings.database_path = v.clone();
        }
        if let Some(v) = self.pool_size {
            settings.pool_size = v;
        }
        if let Some(v) = &self.master_key_file {
            settings.master_key_file = v.clone();
        }
        if let Some(v) = &self.session_key_file {
            settings.session_key_file = v.clone();
        }
        if let Some(v) = self.session_ttl_secs {
            settings.session_ttl_secs = v;
        }
        if let Some(v) = self.request_timeout_secs {
            settings.request_timeout_secs = v;
        }
        if let Some(v) = self.max_upload_bytes {
            settings.max_upload_bytes = v;
        }

        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn flags_override_config_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keep.toml");
        fs::write(&path, "run_address = \"0.0.0.0:1\"\npool_size = 9\n").unwrap();

        let args = ServeArgs {
            config: Some(path),
            run_address: Some("127.0.0.1:7777".into()),
            ..ServeArgs::default()
        };
        let settings = args.settings().unwrap();
        assert_eq!(settings.run_address, "127.0.0.1:7777");
        assert_eq!(settings.pool_size, 9);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn invalid_override_is_rejected() {
        let args = ServeArgs {
            session_ttl_secs: Some(0),
            ..ServeArgs::default()
        };
        assert!(args.settings().is_err());
    }

    #[test]
    fn parses_serve_flags() {
        let cli = Cli::try_parse_from([
            "secretkeep",
            "serve",
            "-a",
            "127.0.0.1:9999",
            "-d",
            ":memory:",
            "--pool-size",
            "2",
        ])
        .unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.run_address.as_deref(), Some("127.0.0.1:9999"));
        assert_eq!(args.pool_size, Some(2));
    }
}
