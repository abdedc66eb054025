//! Router assembly.

use std::time::Duration;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::gate::require_session;
use super::handlers;
use super::models::AppState;
use crate::store::Deadline;

/// How far the transport timeout trails the request deadline.  Store work
/// stops at the deadline; the transport timeout only catches a handler
/// that never reaches the store.
const TRANSPORT_GRACE: Duration = Duration::from_secs(1);

/// Transport limits applied to every route.
#[derive(Debug, Clone, Copy)]
pub struct RouterLimits {
    pub max_body_bytes: usize,
    /// Deadline for each request, stamped when it arrives.
    pub request_timeout: Duration,
}

impl Default for RouterLimits {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Build the full API router.
///
/// `/ping`, register and login are open; every other route sits behind
/// the session gate.
pub fn router(state: AppState, limits: RouterLimits) -> Router {
    let open = Router::new()
        .route("/ping", get(handlers::ping))
        .route("/api/user/register", post(handlers::register))
        .route("/api/user/login", post(handlers::login));

    let gated = Router::new()
        .route("/api/user/sync", get(handlers::sync))
        .route("/api/user/audit", get(handlers::audit))
        .route("/api/keep", post(handlers::keep))
        .route("/api/keepfile", post(handlers::keep_file))
        .route("/api/read", get(handlers::read))
        .route("/api/readfile", get(handlers::read_file))
        .route("/api/edit", post(handlers::edit))
        .route("/api/editfile", post(handlers::edit_file))
        .route("/api/delete", post(handlers::delete))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .merge(open)
        .merge(gated)
        .layer(middleware::from_fn_with_state(
            limits.request_timeout,
            stamp_deadline,
        ))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(limits.max_body_bytes))
        .layer(TimeoutLayer::new(limits.request_timeout + TRANSPORT_GRACE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Attach the request's `Deadline` before any handler runs.
async fn stamp_deadline(
    State(timeout): State<Duration>,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(Deadline::after(timeout));
    next.run(request).await
}
