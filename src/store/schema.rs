//! SQLite schema and the per-type payload statements.
//!
//! Every payload table has the same shape.  The statements for each one
//! are built at compile time with `concat!` and picked by matching on
//! `DataType`, so no SQL is ever assembled from request data.

use crate::vault::DataType;

/// Current schema version, recorded in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

pub const CREATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id                TEXT PRIMARY KEY,
    username          TEXT NOT NULL UNIQUE,
    password_verifier TEXT NOT NULL,
    created_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS secrets (
    static_id   TEXT PRIMARY KEY,
    dynamic_id  TEXT NOT NULL,
    name        TEXT NOT NULL,
    description TEXT NOT NULL,
    data_type   TEXT NOT NULL CHECK (data_type IN ('passwords', 'cards', 'files')),
    owner_id    TEXT NOT NULL REFERENCES accounts(id),
    created_at  TEXT NOT NULL,
    changed_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_secrets_owner ON secrets(owner_id, created_at);

CREATE TABLE IF NOT EXISTS passwords (
    static_id   TEXT PRIMARY KEY REFERENCES secrets(static_id) ON DELETE CASCADE,
    ciphertext  BLOB NOT NULL,
    wrapped_key BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS cards (
    static_id   TEXT PRIMARY KEY REFERENCES secrets(static_id) ON DELETE CASCADE,
    ciphertext  BLOB NOT NULL,
    wrapped_key BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    static_id   TEXT PRIMARY KEY REFERENCES secrets(static_id) ON DELETE CASCADE,
    ciphertext  BLOB NOT NULL,
    wrapped_key BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_log (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp   TEXT NOT NULL,
    account_id  TEXT,
    operation   TEXT NOT NULL,
    static_id   TEXT,
    outcome     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_account ON audit_log(account_id, id);
";

/// SQL for one payload table.
pub struct PayloadStatements {
    pub insert: &'static str,
    pub update: &'static str,
    pub select: &'static str,
    pub delete: &'static str,
}

macro_rules! payload_statements {
    ($table:literal) => {
        PayloadStatements {
            insert: concat!(
                "INSERT INTO ",
                $table,
                " (static_id, ciphertext, wrapped_key) VALUES (?1, ?2, ?3)"
            ),
            update: concat!(
                "UPDATE ",
                $table,
                " SET ciphertext = ?2, wrapped_key = ?3 WHERE static_id = ?1"
            ),
            select: concat!(
                "SELECT ciphertext, wrapped_key FROM ",
                $table,
                " WHERE static_id = ?1"
            ),
            delete: concat!("DELETE FROM ", $table, " WHERE static_id = ?1"),
        }
    };
}

static PASSWORDS: PayloadStatements = payload_statements!("passwords");
static CARDS: PayloadStatements = payload_statements!("cards");
static FILES: PayloadStatements = payload_statements!("files");

/// Statements for the payload table that holds `data_type` secrets.
pub fn payload_statements(data_type: DataType) -> &'static PayloadStatements {
    match data_type {
        DataType::Passwords => &PASSWORDS,
        DataType::Cards => &CARDS,
        DataType::Files => &FILES,
    }
}
