//! Session gate for authenticated routes.

use axum::extract::{Request, State};
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::models::AppState;
use crate::errors::{KeepError, Result};
use crate::session::{SessionAuthority, SESSION_COOKIE};
use crate::vault::AccountId;

/// Extract the session credential from the request's cookies.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            cookie
                .trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
}

/// Resolve the account behind a request, or fail with `Unauthorized`.
pub fn authenticate(sessions: &SessionAuthority, headers: &HeaderMap) -> Result<AccountId> {
    let token = session_token(headers).ok_or(KeepError::Unauthorized)?;
    sessions.validate(token)
}

/// Middleware: reject requests without a valid session, otherwise make
/// the caller's `AccountId` available as a request extension.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(state.vault.sessions(), request.headers()) {
        Ok(account) => {
            request.extensions_mut().insert(account);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(path = %request.uri().path(), "request without valid session");
            e.into_response()
        }
    }
}
