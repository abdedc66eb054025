//! Integration tests for vault operations: ownership, versioning and the
//! secret lifecycle across all three data types.

use std::time::Duration;

use secretkeep::crypto::kdf::Argon2Params;
use secretkeep::crypto::{KeyEnvelope, MasterKey};
use secretkeep::errors::KeepError;
use secretkeep::session::{SessionAuthority, DEFAULT_TTL};
use secretkeep::store::{Deadline, SecretStore};
use secretkeep::vault::{
    AccountId, CardData, Credentials, DataType, FileData, NewSecret, SecretId, SecretUpdate, Vault,
};

fn vault() -> Vault {
    let store = SecretStore::in_memory().expect("store");
    let envelope = KeyEnvelope::new(&MasterKey::new([0x11u8; 32])).expect("envelope");
    let sessions = SessionAuthority::new(&[0x22u8; 32], DEFAULT_TTL).expect("sessions");
    let params = Argon2Params {
        memory_kib: 8192,
        iterations: 1,
        parallelism: 1,
    };
    Vault::new(store, envelope, sessions, params).expect("vault")
}

fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(10))
}

fn account(vault: &Vault, name: &str) -> AccountId {
    vault.register(&deadline(), name, "long enough password").unwrap().account_id
}

fn payload_for(data_type: DataType) -> Vec<u8> {
    match data_type {
        DataType::Passwords => serde_json::to_vec(&Credentials {
            login: "alice@example.com".into(),
            password: "s3cr3t!".into(),
        }),
        DataType::Cards => serde_json::to_vec(&CardData {
            card_number: "4111111111111111".into(),
            expired_at: "12/29".into(),
            cardholder_name: "ALICE".into(),
            code: "123".into(),
        }),
        DataType::Files => serde_json::to_vec(&FileData::new("notes.bin", vec![0, 1, 2, 254])),
    }
    .unwrap()
}

fn new_secret(data_type: DataType) -> NewSecret {
    NewSecret {
        name: format!("my {data_type}"),
        description: "initial".into(),
        data_type,
    }
}

fn update(data_type: DataType, description: &str) -> SecretUpdate {
    SecretUpdate {
        name: format!("my {data_type}"),
        description: description.into(),
        data_type,
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[test]
fn duplicate_register_conflicts_and_first_login_still_works() {
    let v = vault();
    let first = v.register(&deadline(), "alice", "password-one").unwrap();

    let err = v.register(&deadline(), "alice", "password-two").unwrap_err();
    assert!(matches!(err, KeepError::Conflict(_)));

    let session = v.login(&deadline(), "alice", "password-one").unwrap();
    assert_eq!(session.account_id, first.account_id);
    assert!(matches!(
        v.login(&deadline(), "alice", "password-two"),
        Err(KeepError::Unauthorized)
    ));
}

#[test]
fn short_passwords_register_and_the_second_registration_conflicts() {
    let v = vault();
    let first = v.register(&deadline(), "alice", "pw1").unwrap();

    let err = v.register(&deadline(), "alice", "pw2").unwrap_err();
    assert!(matches!(err, KeepError::Conflict(_)));

    let session = v.login(&deadline(), "alice", "pw1").unwrap();
    assert_eq!(session.account_id, first.account_id);
    assert!(matches!(
        v.login(&deadline(), "alice", "pw2"),
        Err(KeepError::Unauthorized)
    ));
}

#[test]
fn unknown_user_and_wrong_password_look_the_same() {
    let v = vault();
    account(&v, "alice");

    let unknown = v.login(&deadline(), "bob", "long enough password").unwrap_err();
    let wrong = v.login(&deadline(), "alice", "not the password").unwrap_err();
    assert_eq!(unknown.to_string(), wrong.to_string());
    assert_eq!(unknown.status_code(), 401);
}

// ---------------------------------------------------------------------------
// Secret lifecycle
// ---------------------------------------------------------------------------

#[test]
fn create_then_read_returns_exact_plaintext_for_every_type() {
    let v = vault();
    let owner = account(&v, "alice");

    for dt in DataType::ALL {
        let plaintext = payload_for(dt);
        let meta = v.create_secret(&deadline(), &owner, new_secret(dt), &plaintext).unwrap();
        assert_eq!(meta.owner_id, owner);
        assert_eq!(meta.data_type, dt);

        let read = v.read_secret(&deadline(), &owner, &meta.static_id).unwrap();
        assert_eq!(&read.data[..], &plaintext[..]);
        assert_eq!(read.metadata, meta);
    }
}

#[test]
fn other_accounts_cannot_touch_a_secret() {
    let v = vault();
    let owner = account(&v, "alice");
    let other = account(&v, "mallory");
    let plaintext = payload_for(DataType::Passwords);
    let meta = v
        .create_secret(&deadline(), &owner, new_secret(DataType::Passwords), &plaintext)
        .unwrap();

    assert!(matches!(
        v.read_secret(&deadline(), &other, &meta.static_id),
        Err(KeepError::NotFound)
    ));
    assert!(matches!(
        v.edit_secret(&deadline(), &other, &meta.static_id, update(DataType::Passwords, "x"), &plaintext),
        Err(KeepError::NotFound)
    ));
    assert!(matches!(
        v.delete_secret(&deadline(), &other, &meta.static_id),
        Err(KeepError::NotFound)
    ));

    // The owner is unaffected.
    assert!(v.read_secret(&deadline(), &owner, &meta.static_id).is_ok());
    assert!(v
        .edit_secret(&deadline(), &owner, &meta.static_id, update(DataType::Passwords, "y"), &plaintext)
        .is_ok());
    assert!(v.delete_secret(&deadline(), &owner, &meta.static_id).is_ok());
}

#[test]
fn foreign_secret_reports_like_a_missing_one() {
    let v = vault();
    let owner = account(&v, "alice");
    let other = account(&v, "mallory");
    let meta = v
        .create_secret(&deadline(), &owner, new_secret(DataType::Cards), &payload_for(DataType::Cards))
        .unwrap();

    let foreign = v.read_secret(&deadline(), &other, &meta.static_id).unwrap_err();
    let missing = v.read_secret(&deadline(), &other, &SecretId::generate()).unwrap_err();
    assert_eq!(foreign.to_string(), missing.to_string());
    assert_eq!(foreign.status_code(), missing.status_code());
}

#[test]
fn static_id_is_stable_and_dynamic_id_changes_per_edit() {
    let v = vault();
    let owner = account(&v, "alice");
    let meta = v
        .create_secret(&deadline(), &owner, new_secret(DataType::Cards), &payload_for(DataType::Cards))
        .unwrap();

    // No edit, no change.
    let listed = v.list_metadata(&deadline(), &owner).unwrap();
    assert_eq!(listed[0].dynamic_id, meta.dynamic_id);

    let mut seen = vec![meta.dynamic_id.clone()];
    for i in 0..3 {
        let edited = v
            .edit_secret(
                &deadline(),
                &owner,
                &meta.static_id,
                update(DataType::Cards, &format!("edit {i}")),
                &payload_for(DataType::Cards),
            )
            .unwrap();
        assert_eq!(edited.static_id, meta.static_id);
        assert!(!seen.contains(&edited.dynamic_id));
        seen.push(edited.dynamic_id);
    }

    let listed = v.list_metadata(&deadline(), &owner).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].static_id, meta.static_id);
    assert_eq!(Some(&listed[0].dynamic_id), seen.last());
    assert_eq!(listed[0].description, "edit 2");
}

#[test]
fn edit_replaces_plaintext() {
    let v = vault();
    let owner = account(&v, "alice");
    let meta = v
        .create_secret(&deadline(), &owner, new_secret(DataType::Passwords), &payload_for(DataType::Passwords))
        .unwrap();

    let replacement = serde_json::to_vec(&Credentials {
        login: "alice".into(),
        password: "rotated".into(),
    })
    .unwrap();
    v.edit_secret(&deadline(), &owner, &meta.static_id, update(DataType::Passwords, "rotated"), &replacement)
        .unwrap();

    let read = v.read_secret(&deadline(), &owner, &meta.static_id).unwrap();
    assert_eq!(&read.data[..], &replacement[..]);
    assert_eq!(read.metadata.description, "rotated");
}

#[test]
fn edit_cannot_change_data_type() {
    let v = vault();
    let owner = account(&v, "alice");
    let meta = v
        .create_secret(&deadline(), &owner, new_secret(DataType::Passwords), &payload_for(DataType::Passwords))
        .unwrap();

    let err = v
        .edit_secret(&deadline(), &owner, &meta.static_id, update(DataType::Cards, "x"), &payload_for(DataType::Cards))
        .unwrap_err();
    assert!(matches!(err, KeepError::NotFound));
    assert_eq!(v.list_metadata(&deadline(), &owner).unwrap()[0], meta);
}

#[test]
fn delete_then_read_fails_and_list_drops_it() {
    let v = vault();
    let owner = account(&v, "alice");
    let keep = v
        .create_secret(&deadline(), &owner, new_secret(DataType::Files), &payload_for(DataType::Files))
        .unwrap();
    let gone = v
        .create_secret(&deadline(), &owner, new_secret(DataType::Cards), &payload_for(DataType::Cards))
        .unwrap();

    v.delete_secret(&deadline(), &owner, &gone.static_id).unwrap();

    assert!(v.read_secret(&deadline(), &owner, &gone.static_id).is_err());
    let listed = v.list_metadata(&deadline(), &owner).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].static_id, keep.static_id);
}

#[test]
fn list_is_empty_then_exactly_three() {
    let v = vault();
    let owner = account(&v, "alice");
    assert!(v.list_metadata(&deadline(), &owner).unwrap().is_empty());

    for dt in DataType::ALL {
        v.create_secret(&deadline(), &owner, new_secret(dt), &payload_for(dt)).unwrap();
    }

    let listed = v.list_metadata(&deadline(), &owner).unwrap();
    assert_eq!(listed.len(), 3);
    // Metadata never carries payload bytes.
    let json = serde_json::to_string(&listed).unwrap();
    assert!(!json.contains("4111111111111111"));
    assert!(!json.contains("s3cr3t!"));
}

#[test]
fn name_and_description_limits() {
    let v = vault();
    let owner = account(&v, "alice");
    let plaintext = payload_for(DataType::Passwords);

    let empty_name = NewSecret {
        name: String::new(),
        ..new_secret(DataType::Passwords)
    };
    assert!(matches!(
        v.create_secret(&deadline(), &owner, empty_name, &plaintext),
        Err(KeepError::Validation(_))
    ));

    let long_description = NewSecret {
        description: "d".repeat(4097),
        ..new_secret(DataType::Passwords)
    };
    assert!(matches!(
        v.create_secret(&deadline(), &owner, long_description, &plaintext),
        Err(KeepError::Validation(_))
    ));
}
