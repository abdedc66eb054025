//! REST boundary over the vault.
//!
//! - `routes`: router assembly and transport limits
//! - `gate`: session middleware for authenticated routes
//! - `handlers`: one async handler per endpoint
//! - `models`: shared state and request/response bodies
//! - `error`: `KeepError` to HTTP response mapping

pub mod error;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod routes;

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;

use crate::errors::Result;

pub use models::AppState;
pub use routes::{router, RouterLimits};

/// Serve `app` on `listener` until `shutdown` resolves, then drain
/// in-flight requests.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
