//! Mapping of `KeepError` onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::errors::KeepError;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for KeepError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Server faults are logged here and never described to the client.
        let message = match &self {
            KeepError::Unauthorized | KeepError::NotFound => "unauthorized".to_string(),
            e if e.is_internal() => {
                tracing::error!(error = %e, "request failed");
                "internal server error".to_string()
            }
            e => e.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
