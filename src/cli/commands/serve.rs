//! `secretkeep serve`: run the HTTP server until interrupted.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::api::{self, AppState, RouterLimits};
use crate::cli::{output, ServeArgs};
use crate::config::Settings;
use crate::crypto::{load_keyfile, KeyEnvelope, MasterKey};
use crate::errors::{KeepError, Result};
use crate::session::SessionAuthority;
use crate::store::SecretStore;
use crate::vault::Vault;

/// How often expired audit entries are pruned while serving.
const AUDIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Execute the `serve` command.
pub async fn execute(args: &ServeArgs) -> Result<()> {
    let settings = args.settings()?;
    crate::logging::init(&settings.log_level);

    let vault = build_vault(&settings)?;
    let limits = RouterLimits {
        max_body_bytes: settings.max_upload_bytes,
        request_timeout: settings.request_timeout(),
    };
    let state = AppState::new(vault);
    let pruner = tokio::spawn(prune_audit_periodically(state.vault.clone()));
    let app = api::router(state, limits);

    let listener = TcpListener::bind(&settings.run_address)
        .await
        .map_err(|e| KeepError::Config(format!("cannot bind {}: {e}", settings.run_address)))?;
    let address = listener.local_addr()?;

    tracing::info!(%address, database = %settings.database_path.display(), "server started");
    output::info(&format!("SecretKeep listening on http://{address}"));

    let served = api::serve(listener, app, shutdown_signal()).await;
    pruner.abort();
    served?;

    tracing::info!("server stopped");
    Ok(())
}

/// Load both keys and open the store.
pub fn build_vault(settings: &Settings) -> Result<Vault> {
    let master_bytes = load_keyfile(&settings.master_key_file)?;
    let master = MasterKey::from_slice(&master_bytes)?;
    let envelope = KeyEnvelope::new(&master)?;

    let session_key = load_keyfile(&settings.session_key_file)?;
    let sessions = SessionAuthority::new(&session_key, settings.session_ttl())?;

    let store = SecretStore::open(&settings.store_config())?;
    Vault::new(store, envelope, sessions, settings.argon2_params())
}

async fn prune_audit_periodically(vault: Arc<Vault>) {
    let mut ticker = tokio::time::interval(AUDIT_PRUNE_INTERVAL);
    // The first tick fires immediately; opening the store already pruned.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let vault = vault.clone();
        match tokio::task::spawn_blocking(move || vault.prune_audit()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "audit pruning failed"),
            Err(e) => tracing::warn!(error = %e, "audit pruning task failed"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining requests");
}
