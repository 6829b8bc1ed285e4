//! Shared test utilities for key store testing.
//!
//! Feature-gated behind `testutil`. Enable it in `[dev-dependencies]`:
//!
//! ```toml
//! [dev-dependencies]
//! chainauth-keystore = { path = "../keystore", features = ["testutil"] }
//! ```

use crate::{
    key::KeySet,
    store::{KeyStore, MemoryKeyStore},
};

/// Creates a [`MemoryKeyStore`] holding `count` keys, `"0001"` onwards.
///
/// # Panics
///
/// Panics if key generation fails.
pub async fn populated_store(count: usize) -> MemoryKeyStore {
    let store = MemoryKeyStore::new();
    for _ in 0..count {
        store.rotate().await.expect("rotate failed");
    }
    store
}

/// Returns the key ids of `set` as owned strings, in order.
#[must_use]
pub fn kids(set: &KeySet) -> Vec<String> {
    set.kids().map(str::to_owned).collect()
}

/// Assert that a key store result is a [`KeyStoreError::KeyNotFound`].
#[macro_export]
macro_rules! assert_key_not_found {
    ($result:expr) => {{
        let result = $result;
        assert!(
            matches!(result, Err($crate::error::KeyStoreError::KeyNotFound { .. })),
            "expected KeyStoreError::KeyNotFound, got: {:?}",
            result,
        );
    }};
}

/// Assert that a key store result is a [`KeyStoreError::MalformedState`].
#[macro_export]
macro_rules! assert_malformed {
    ($result:expr) => {{
        let result = $result;
        assert!(
            matches!(result, Err($crate::error::KeyStoreError::MalformedState { .. })),
            "expected KeyStoreError::MalformedState, got: {:?}",
            result,
        );
    }};
}

/// Assert that a key store result is a [`KeyStoreError::StorageFailure`].
#[macro_export]
macro_rules! assert_storage_failure {
    ($result:expr) => {{
        let result = $result;
        assert!(
            matches!(result, Err($crate::error::KeyStoreError::StorageFailure { .. })),
            "expected KeyStoreError::StorageFailure, got: {:?}",
            result,
        );
    }};
}
