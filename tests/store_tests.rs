//! Integration tests for the SQLite secret store.

use std::time::Duration;

use secretkeep::crypto::kdf::{hash_password, Argon2Params};
use secretkeep::errors::KeepError;
use secretkeep::store::{self, Deadline, SecretStore, StoreConfig};
use secretkeep::vault::{
    AccountId, DataType, EncryptedPayload, SecretId, SecretMetadata, SecretUpdate,
};
use tempfile::TempDir;

fn fast_params() -> Argon2Params {
    Argon2Params {
        memory_kib: 8192,
        iterations: 1,
        parallelism: 1,
    }
}

fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(10))
}

fn file_store(dir: &TempDir) -> SecretStore {
    SecretStore::open(&StoreConfig {
        path: Some(dir.path().join("keep.db")),
        pool_size: 3,
        op_timeout: Duration::from_secs(5),
        audit_retention: None,
    })
    .expect("open store")
}

fn new_secret(store: &SecretStore, owner: &AccountId, data_type: DataType) -> SecretMetadata {
    let ts = store::now();
    let meta = SecretMetadata {
        static_id: SecretId::generate(),
        dynamic_id: SecretId::generate(),
        name: format!("{data_type} secret"),
        description: "first".into(),
        data_type,
        owner_id: owner.clone(),
        created_at: ts,
        changed_at: ts,
    };
    let payload = EncryptedPayload {
        ciphertext: b"ct-1".to_vec(),
        wrapped_key: b"wk-1".to_vec(),
    };
    store.create_secret(&deadline(), &meta, &payload).expect("create secret");
    meta
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[test]
fn duplicate_username_conflicts_and_keeps_first_account() {
    let store = SecretStore::in_memory().unwrap();
    let params = fast_params();
    let v1 = hash_password("password-one", &params).unwrap();
    let v2 = hash_password("password-two", &params).unwrap();

    let first = store.create_account(&deadline(), "alice", &v1).unwrap();
    let err = store.create_account(&deadline(), "alice", &v2).unwrap_err();
    assert!(matches!(err, KeepError::Conflict(_)));

    let found = store.find_account(&deadline(), "alice").unwrap().unwrap();
    assert_eq!(found.id, first.id);
    assert_eq!(found.password_verifier, v1);
}

#[test]
fn verify_account_distinguishes_nothing_but_success() {
    let store = SecretStore::in_memory().unwrap();
    let params = fast_params();
    let verifier = hash_password("password-one", &params).unwrap();
    let account = store.create_account(&deadline(), "alice", &verifier).unwrap();

    assert_eq!(
        store.verify_account(&deadline(), "alice", "password-one", &params).unwrap(),
        Some(account.id)
    );
    assert_eq!(store.verify_account(&deadline(), "alice", "wrong-pass", &params).unwrap(), None);
    assert_eq!(store.verify_account(&deadline(), "nobody", "password-one", &params).unwrap(), None);
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

#[test]
fn payload_lives_in_the_table_for_its_type() {
    let store = SecretStore::in_memory().unwrap();
    let owner = store.create_account(&deadline(), "alice", "v").unwrap().id;

    for dt in DataType::ALL {
        let meta = new_secret(&store, &owner, dt);
        assert!(store.read_payload(&deadline(), &meta.static_id, dt).is_ok());
        for other in DataType::ALL.into_iter().filter(|o| *o != dt) {
            assert!(matches!(
                store.read_payload(&deadline(), &meta.static_id, other),
                Err(KeepError::NotFound)
            ));
        }
    }
}

#[test]
fn edit_rewrites_metadata_and_payload_together() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let owner = store.create_account(&deadline(), "alice", "v").unwrap().id;
    let meta = new_secret(&store, &owner, DataType::Passwords);

    let update = SecretUpdate {
        name: "renamed".into(),
        description: "second".into(),
        data_type: DataType::Passwords,
    };
    let payload = EncryptedPayload {
        ciphertext: b"ct-2".to_vec(),
        wrapped_key: b"wk-2".to_vec(),
    };
    let edited = store
        .edit_secret(&deadline(), &meta.static_id, &owner, &update, &payload)
        .unwrap();

    assert_eq!(edited.static_id, meta.static_id);
    assert_ne!(edited.dynamic_id, meta.dynamic_id);
    assert_eq!(edited.name, "renamed");
    assert_eq!(edited.created_at, meta.created_at);
    assert!(edited.changed_at >= meta.changed_at);

    let stored = store.get_metadata(&deadline(), &meta.static_id).unwrap().unwrap();
    assert_eq!(stored, edited);
    let sealed = store.read_payload(&deadline(), &meta.static_id, DataType::Passwords).unwrap();
    assert_eq!(sealed.ciphertext, b"ct-2");
    assert_eq!(sealed.wrapped_key, b"wk-2");
}

#[test]
fn edit_by_other_owner_or_type_changes_nothing() {
    let store = SecretStore::in_memory().unwrap();
    let owner = store.create_account(&deadline(), "alice", "v").unwrap().id;
    let intruder = store.create_account(&deadline(), "mallory", "v").unwrap().id;
    let meta = new_secret(&store, &owner, DataType::Cards);

    let payload = EncryptedPayload {
        ciphertext: b"evil".to_vec(),
        wrapped_key: b"evil".to_vec(),
    };
    let mut update = SecretUpdate {
        name: "x".into(),
        description: "x".into(),
        data_type: DataType::Cards,
    };

    let err = store
        .edit_secret(&deadline(), &meta.static_id, &intruder, &update, &payload)
        .unwrap_err();
    assert!(matches!(err, KeepError::NotFound));

    update.data_type = DataType::Files;
    let err = store
        .edit_secret(&deadline(), &meta.static_id, &owner, &update, &payload)
        .unwrap_err();
    assert!(matches!(err, KeepError::NotFound));

    assert_eq!(store.get_metadata(&deadline(), &meta.static_id).unwrap().unwrap(), meta);
    let sealed = store.read_payload(&deadline(), &meta.static_id, DataType::Cards).unwrap();
    assert_eq!(sealed.ciphertext, b"ct-1");
}

#[test]
fn delete_removes_both_rows_and_only_for_owner() {
    let store = SecretStore::in_memory().unwrap();
    let owner = store.create_account(&deadline(), "alice", "v").unwrap().id;
    let intruder = store.create_account(&deadline(), "mallory", "v").unwrap().id;
    let meta = new_secret(&store, &owner, DataType::Files);

    assert!(matches!(
        store.delete_secret(&deadline(), &meta.static_id, &intruder),
        Err(KeepError::NotFound)
    ));
    assert!(store.get_metadata(&deadline(), &meta.static_id).unwrap().is_some());

    store.delete_secret(&deadline(), &meta.static_id, &owner).unwrap();
    assert!(store.get_metadata(&deadline(), &meta.static_id).unwrap().is_none());
    assert!(matches!(
        store.read_payload(&deadline(), &meta.static_id, DataType::Files),
        Err(KeepError::NotFound)
    ));
    assert!(matches!(
        store.delete_secret(&deadline(), &meta.static_id, &owner),
        Err(KeepError::NotFound)
    ));
}

#[test]
fn list_is_scoped_and_ordered_by_creation() {
    let store = SecretStore::in_memory().unwrap();
    let alice = store.create_account(&deadline(), "alice", "v").unwrap().id;
    let bob = store.create_account(&deadline(), "bob", "v").unwrap().id;

    assert!(store.list_metadata(&deadline(), &alice).unwrap().is_empty());

    let mut created = Vec::new();
    for dt in DataType::ALL {
        created.push(new_secret(&store, &alice, dt));
        std::thread::sleep(Duration::from_millis(2));
    }
    new_secret(&store, &bob, DataType::Passwords);

    let listed = store.list_metadata(&deadline(), &alice).unwrap();
    assert_eq!(listed, created);
    assert_eq!(store.list_metadata(&deadline(), &bob).unwrap().len(), 1);
}

#[test]
fn data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let (owner, meta) = {
        let store = file_store(&dir);
        let owner = store.create_account(&deadline(), "alice", "v").unwrap().id;
        let meta = new_secret(&store, &owner, DataType::Cards);
        (owner, meta)
    };

    let store = file_store(&dir);
    store.ping(&deadline()).unwrap();
    assert_eq!(store.list_metadata(&deadline(), &owner).unwrap(), vec![meta]);
}

#[test]
fn concurrent_writers_share_the_pool() {
    let dir = TempDir::new().unwrap();
    let store = std::sync::Arc::new(file_store(&dir));
    let owner = store.create_account(&deadline(), "alice", "v").unwrap().id;

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let store = store.clone();
            let owner = owner.clone();
            std::thread::spawn(move || {
                for _ in 0..5 {
                    new_secret(&store, &owner, DataType::Passwords);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(store.list_metadata(&deadline(), &owner).unwrap().len(), 30);
}

#[test]
fn write_blocked_past_its_deadline_is_not_committed() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let owner = store.create_account(&deadline(), "alice", "v").unwrap().id;

    let (locked_tx, locked_rx) = std::sync::mpsc::channel();
    let path = dir.path().join("keep.db");
    let holder = std::thread::spawn(move || {
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.execute_batch("BEGIN IMMEDIATE").unwrap();
        locked_tx.send(()).unwrap();
        std::thread::sleep(Duration::from_millis(800));
        conn.execute_batch("COMMIT").unwrap();
    });
    locked_rx.recv().unwrap();

    let ts = store::now();
    let meta = SecretMetadata {
        static_id: SecretId::generate(),
        dynamic_id: SecretId::generate(),
        name: "late".into(),
        description: String::new(),
        data_type: DataType::Passwords,
        owner_id: owner.clone(),
        created_at: ts,
        changed_at: ts,
    };
    let payload = EncryptedPayload {
        ciphertext: b"ct".to_vec(),
        wrapped_key: b"wk".to_vec(),
    };
    let short = Deadline::after(Duration::from_millis(200));
    assert!(store.create_secret(&short, &meta, &payload).is_err());

    holder.join().unwrap();
    assert!(store.get_metadata(&deadline(), &meta.static_id).unwrap().is_none());
    assert!(store.list_metadata(&deadline(), &owner).unwrap().is_empty());
}
