//! REST handlers.
//!
//! Handlers parse and check the request, then run the matching `Vault`
//! operation on the blocking pool under the request's `Deadline`.  JSON bodies are parsed by hand from
//! the raw bytes so every malformed body is a plain 400, including the
//! bodies sent with the `GET` read endpoints.

use axum::body::Bytes;
use axum::extract::{Multipart, Query, State};
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::de::DeserializeOwned;

use super::models::{
    AppState, AuditQuery, AuthRequest, AuthResponse, EditRequest, FileMetadata, KeepRequest,
    ReadResponse, SecretRef,
};
use crate::errors::{KeepError, Result};
use crate::store::audit::DEFAULT_AUDIT_LIMIT;
use crate::store::Deadline;
use crate::vault::{AccountId, FileData, NewSecret, SecretId, SecretUpdate, Vault};

/// Run a vault operation on the blocking thread pool.
async fn run<T, F>(state: &AppState, op: F) -> Result<T>
where
    F: FnOnce(&Vault) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let vault = state.vault.clone();
    tokio::task::spawn_blocking(move || op(&vault))
        .await
        .map_err(|e| KeepError::Storage(format!("vault task failed: {e}")))?
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| KeepError::Validation(format!("malformed body: {e}")))
}

/// The body's `user_id` must name the authenticated caller.
fn check_caller(account: &AccountId, user_id: &str) -> Result<()> {
    match AccountId::parse(user_id) {
        Ok(claimed) if &claimed == account => Ok(()),
        _ => Err(KeepError::Unauthorized),
    }
}

fn session_response(state: &AppState, account_id: AccountId, token: &str) -> Response {
    let cookie = state.vault.sessions().cookie(token);
    (
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(AuthResponse {
            user_id: account_id,
        }),
    )
        .into_response()
}

// ── Unauthenticated ──────────────────────────────────────────────────

/// `GET /ping`
pub async fn ping(
    State(state): State<AppState>,
    Extension(deadline): Extension<Deadline>,
) -> Result<StatusCode> {
    run(&state, move |vault| vault.ping(&deadline)).await?;
    Ok(StatusCode::OK)
}

/// `POST /api/user/register`
pub async fn register(
    State(state): State<AppState>,
    Extension(deadline): Extension<Deadline>,
    body: Bytes,
) -> Result<Response> {
    let req: AuthRequest = parse_json(&body)?;
    let session = run(&state, move |vault| {
        vault.register(&deadline, &req.login, &req.password)
    })
    .await?;
    Ok(session_response(&state, session.account_id, &session.token))
}

/// `POST /api/user/login`
pub async fn login(
    State(state): State<AppState>,
    Extension(deadline): Extension<Deadline>,
    body: Bytes,
) -> Result<Response> {
    // A body that is not even JSON cannot name a valid account.
    let req: AuthRequest = parse_json(&body).map_err(|_| KeepError::Unauthorized)?;
    let session = run(&state, move |vault| {
        vault.login(&deadline, &req.login, &req.password)
    })
    .await?;
    Ok(session_response(&state, session.account_id, &session.token))
}

// ── Authenticated ────────────────────────────────────────────────────

/// `GET /api/user/sync`: 204 when the caller has no secrets.
pub async fn sync(
    State(state): State<AppState>,
    Extension(account): Extension<AccountId>,
    Extension(deadline): Extension<Deadline>,
) -> Result<Response> {
    let metadata = run(&state, move |vault| vault.list_metadata(&deadline, &account)).await?;
    if metadata.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(metadata).into_response())
}

/// `GET /api/user/audit`
pub async fn audit(
    State(state): State<AppState>,
    Extension(account): Extension<AccountId>,
    Extension(deadline): Extension<Deadline>,
    Query(query): Query<AuditQuery>,
) -> Result<Response> {
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    let entries = run(&state, move |vault| {
        vault.audit_entries(&deadline, &account, limit)
    })
    .await?;
    Ok(Json(entries).into_response())
}

/// `POST /api/keep`
pub async fn keep(
    State(state): State<AppState>,
    Extension(account): Extension<AccountId>,
    Extension(deadline): Extension<Deadline>,
    body: Bytes,
) -> Result<Response> {
    let req: KeepRequest = parse_json(&body)?;
    let secret = NewSecret {
        name: req.name,
        description: req.description,
        data_type: req.data_type,
    };
    let data = req.data.into_bytes();

    let meta = run(&state, move |vault| {
        vault.create_secret(&deadline, &account, secret, &data)
    })
    .await?;
    Ok(Json(meta).into_response())
}

/// `POST /api/keepfile`: multipart `metadata` (JSON) + `file`.
pub async fn keep_file(
    State(state): State<AppState>,
    Extension(account): Extension<AccountId>,
    Extension(deadline): Extension<Deadline>,
    multipart: Multipart,
) -> Result<Response> {
    let (metadata, file) = read_upload(multipart).await?;
    let meta: FileMetadata = parse_json(&metadata)?;
    let secret = NewSecret {
        name: meta.name,
        description: meta.description,
        data_type: meta.data_type,
    };
    let payload = file.to_payload()?;

    let meta = run(&state, move |vault| {
        vault.create_secret(&deadline, &account, secret, &payload)
    })
    .await?;
    Ok(Json(meta).into_response())
}

/// `GET /api/read`: body `{static_id, user_id, data_type}`.
pub async fn read(
    State(state): State<AppState>,
    Extension(account): Extension<AccountId>,
    Extension(deadline): Extension<Deadline>,
    body: Bytes,
) -> Result<Response> {
    let (static_id, plaintext) = read_secret(&state, deadline, account, &body).await?;
    let data = String::from_utf8(plaintext)
        .map_err(|_| KeepError::Serialization("stored payload is not UTF-8".into()))?;
    Ok(Json(ReadResponse { static_id, data }).into_response())
}

/// `GET /api/readfile`: the stored file record as raw bytes.
pub async fn read_file(
    State(state): State<AppState>,
    Extension(account): Extension<AccountId>,
    Extension(deadline): Extension<Deadline>,
    body: Bytes,
) -> Result<Response> {
    let (_, plaintext) = read_secret(&state, deadline, account, &body).await?;
    Ok((
        [(CONTENT_TYPE, "application/octet-stream")],
        plaintext,
    )
        .into_response())
}

async fn read_secret(
    state: &AppState,
    deadline: Deadline,
    account: AccountId,
    body: &Bytes,
) -> Result<(SecretId, Vec<u8>)> {
    let req: SecretRef = parse_json(body)?;
    check_caller(&account, &req.user_id)?;
    let static_id = SecretId::parse(&req.static_id)?;
    let expected = req.data_type;

    run(state, move |vault| {
        let secret = vault.read_secret(&deadline, &account, &static_id)?;
        if secret.metadata.data_type != expected {
            return Err(KeepError::NotFound);
        }
        Ok((static_id, secret.data.to_vec()))
    })
    .await
}

/// `POST /api/edit`
pub async fn edit(
    State(state): State<AppState>,
    Extension(account): Extension<AccountId>,
    Extension(deadline): Extension<Deadline>,
    body: Bytes,
) -> Result<Response> {
    let mut req: EditRequest = parse_json(&body)?;
    let data = std::mem::take(&mut req.data).into_bytes();
    apply_edit(&state, deadline, account, req, data).await
}

/// `POST /api/editfile`: multipart `metadata` (edit JSON) + `file`.
pub async fn edit_file(
    State(state): State<AppState>,
    Extension(account): Extension<AccountId>,
    Extension(deadline): Extension<Deadline>,
    multipart: Multipart,
) -> Result<Response> {
    let (metadata, file) = read_upload(multipart).await?;
    let req: EditRequest = parse_json(&metadata)?;
    let payload = file.to_payload()?;
    apply_edit(&state, deadline, account, req, payload).await
}

async fn apply_edit(
    state: &AppState,
    deadline: Deadline,
    account: AccountId,
    req: EditRequest,
    payload: Vec<u8>,
) -> Result<Response> {
    check_caller(&account, &req.user_id)?;
    let static_id = SecretId::parse(&req.static_id)?;
    let update = SecretUpdate {
        name: req.name,
        description: req.description,
        data_type: req.data_type,
    };

    let meta = run(state, move |vault| {
        vault.edit_secret(&deadline, &account, &static_id, update, &payload)
    })
    .await?;
    Ok(Json(meta).into_response())
}

/// `POST /api/delete`: body `{static_id, user_id, data_type}`.
pub async fn delete(
    State(state): State<AppState>,
    Extension(account): Extension<AccountId>,
    Extension(deadline): Extension<Deadline>,
    body: Bytes,
) -> Result<StatusCode> {
    let req: SecretRef = parse_json(&body)?;
    check_caller(&account, &req.user_id)?;
    let static_id = SecretId::parse(&req.static_id)?;

    run(&state, move |vault| {
        vault.delete_secret(&deadline, &account, &static_id)
    })
    .await?;
    Ok(StatusCode::OK)
}

/// Collect the `metadata` and `file` parts of an upload.
async fn read_upload(mut multipart: Multipart) -> Result<(Bytes, FileData)> {
    let mut metadata = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_upload)? {
        let part = field.name().map(str::to_owned);
        match part.as_deref() {
            Some("metadata") => {
                metadata = Some(field.bytes().await.map_err(bad_upload)?);
            }
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(bad_upload)?;
                file = Some(FileData::new(name, data.to_vec()));
            }
            _ => {}
        }
    }

    let metadata =
        metadata.ok_or_else(|| KeepError::Validation("missing `metadata` part".into()))?;
    let file = file.ok_or_else(|| KeepError::Validation("missing `file` part".into()))?;
    Ok((metadata, file))
}

fn bad_upload(e: axum::extract::multipart::MultipartError) -> KeepError {
    KeepError::Validation(format!("malformed upload: {e}"))
}
