//! Shared state and wire types for the REST API.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::vault::{AccountId, DataType, SecretId, Vault};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub vault: Arc<Vault>,
}

impl AppState {
    pub fn new(vault: Vault) -> Self {
        Self {
            vault: Arc::new(vault),
        }
    }
}

/// Register / login request.  Not `Debug`: it carries a password.
#[derive(Deserialize)]
pub struct AuthRequest {
    pub login: String,
    pub password: String,
}

/// Register / login response.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: AccountId,
}

/// Body of `POST /api/keep`.
#[derive(Deserialize)]
pub struct KeepRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub data_type: DataType,
    pub data: String,
}

/// `metadata` part of `POST /api/keepfile`.
#[derive(Debug, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub data_type: DataType,
}

/// Identifies a secret in read and delete requests.
#[derive(Debug, Deserialize)]
pub struct SecretRef {
    pub static_id: String,
    pub user_id: String,
    pub data_type: DataType,
}

/// Body of `POST /api/edit`, and the `metadata` part of `/api/editfile`
/// (where `data` is absent).
#[derive(Deserialize)]
pub struct EditRequest {
    pub static_id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub data_type: DataType,
    #[serde(default)]
    pub data: String,
}

/// Response of `GET /api/read`.
#[derive(Serialize, Deserialize)]
pub struct ReadResponse {
    pub static_id: SecretId,
    pub data: String,
}

/// Query of `GET /api/user/audit`.
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}
