//! Rotation invariants exercised against both store implementations.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use chainauth_keystore::{
    FileKeyStore, KeyStore, MemoryKeyStore, assert_key_not_found, key::format_key_id,
    testutil::{kids, populated_store},
};
use proptest::prelude::*;
use rstest::rstest;
use serde_json::{Value, json};
use tempfile::TempDir;

/// A store plus whatever must outlive it.
struct Fixture {
    store: Arc<dyn KeyStore>,
    _dir: Option<TempDir>,
}

fn memory() -> Fixture {
    Fixture { store: Arc::new(MemoryKeyStore::new()), _dir: None }
}

fn file() -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let store = FileKeyStore::new(dir.path().join("keys"));
    Fixture { store: Arc::new(store), _dir: Some(dir) }
}

#[derive(Debug, Clone, Copy)]
enum Backend {
    Memory,
    File,
}

/// Two real keys followed by `placeholder` as `"0003"`, on both sides.
async fn with_placeholder(backend: Backend, placeholder: &Value) -> Fixture {
    let seed = populated_store(2).await;
    let mut private = serde_json::to_value(seed.private_key_set()).unwrap();
    let mut public = serde_json::to_value(seed.public_key_set().await.unwrap()).unwrap();
    for set in [&mut private, &mut public] {
        set["keys"].as_array_mut().unwrap().push(placeholder.clone());
        set["maxid"] = json!("0003");
    }

    match backend {
        Backend::Memory => {
            let store = MemoryKeyStore::with_key_sets(
                serde_json::from_value(private).unwrap(),
                serde_json::from_value(public).unwrap(),
            );
            Fixture { store: Arc::new(store), _dir: None }
        },
        Backend::File => {
            let dir = TempDir::new().expect("tempdir");
            let store = FileKeyStore::new(dir.path().join("keys"));
            std::fs::create_dir_all(store.dir()).unwrap();
            std::fs::write(store.private_path(), serde_json::to_vec(&private).unwrap()).unwrap();
            std::fs::write(store.public_path(), serde_json::to_vec(&public).unwrap()).unwrap();
            Fixture { store: Arc::new(store), _dir: Some(dir) }
        },
    }
}

#[rstest]
#[case::memory(memory())]
#[case::file(file())]
#[tokio::test]
async fn n_rotations_from_empty_yield_n_sequential_ids(#[case] fixture: Fixture) {
    let store = fixture.store;
    let n = 12;
    for i in 1..=n {
        assert_eq!(store.rotate().await.unwrap(), format_key_id(i));
    }

    let public = store.public_key_set().await.unwrap();
    let expected: Vec<String> = (1..=n).map(format_key_id).collect();
    assert_eq!(kids(&public), expected);
    assert_eq!(public.max_id, "0012");

    for kid in &expected {
        let private = store.find_private_key(kid).await.unwrap();
        assert_eq!(private.public_key(), store.find_public_key(kid).await.unwrap());
    }
}

#[rstest]
#[case::memory(memory())]
#[case::file(file())]
#[tokio::test]
async fn lookup_is_idempotent(#[case] fixture: Fixture) {
    let store = fixture.store;
    store.initialize().await.unwrap();

    let first = store.find_private_key("0001").await.unwrap();
    let second = store.find_private_key("0001").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_hex(), second.to_hex());
}

#[rstest]
#[case::memory(memory())]
#[case::file(file())]
#[tokio::test]
async fn unknown_kid_is_not_found(#[case] fixture: Fixture) {
    let store = fixture.store;
    store.initialize().await.unwrap();
    assert_key_not_found!(store.find_private_key("9999").await);
    assert_key_not_found!(store.find_public_key("9999").await);
}

#[rstest]
#[case::memory(memory())]
#[case::file(file())]
#[tokio::test]
async fn empty_store_has_no_keys(#[case] fixture: Fixture) {
    let store = fixture.store;
    assert_key_not_found!(store.find_private_key("0001").await);
    assert!(store.public_key_set().await.unwrap().is_empty());
}

#[rstest]
#[tokio::test]
async fn placeholder_hides_only_its_own_kid(
    #[values(Backend::Memory, Backend::File)] backend: Backend,
    #[values(
        json!({ "kty": "EC", "alg": "", "kid": "0003" }),
        json!({ "kty": "EC", "alg": null, "kid": "0003" }),
        json!({ "kty": "EC", "hex": null, "alg": "ES384", "kid": "0003" })
    )]
    placeholder: Value,
) {
    let fixture = with_placeholder(backend, &placeholder).await;
    let store = &fixture.store;

    for kid in ["0001", "0002"] {
        let private = store.find_private_key(kid).await.unwrap();
        assert_eq!(private.public_key(), store.find_public_key(kid).await.unwrap());
    }
    assert_key_not_found!(store.find_private_key("0003").await);
    assert_key_not_found!(store.find_public_key("0003").await);

    // Rotation carries on past the placeholder and keeps history intact.
    let before = store.find_private_key("0001").await.unwrap();
    assert_eq!(store.rotate().await.unwrap(), "0004");
    assert_eq!(store.find_private_key("0001").await.unwrap(), before);
    assert_key_not_found!(store.find_private_key("0003").await);
    store.find_private_key("0004").await.unwrap();
    assert_eq!(kids(&store.public_key_set().await.unwrap()), ["0001", "0002", "0003", "0004"]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn old_keys_survive_any_number_of_rotations(extra in 0usize..20) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let store = MemoryKeyStore::new();
            store.initialize().await.unwrap();
            let original = store.find_private_key("0001").await.unwrap();

            for _ in 0..extra {
                store.rotate().await.unwrap();
            }

            let after = store.find_private_key("0001").await.unwrap();
            assert_eq!(after, original);
            assert_eq!(store.public_key_set().await.unwrap().len(), extra + 1);
        });
    }
}
