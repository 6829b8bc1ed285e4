//! The [`KeyStore`] trait and its in-memory implementation.
//!
//! A key store holds two paired, append-only [`KeySet`]s: one with private
//! material used for signing, one with public material used for
//! verification. Keys are addressed by explicit identifier, never by
//! "current key", so a token stays pinned to the key version that signed it.
//!
//! # Key history
//!
//! ```text
//!   initialize           rotate                rotate
//!  ┌────────────┐     ┌──────────────┐     ┌──────────────────┐
//!  │ 0001       │────►│ 0001, 0002   │────►│ 0001, 0002, 0003 │
//!  │ maxid 0001 │     │ maxid 0002   │     │ maxid 0003       │
//!  └────────────┘     └──────────────┘     └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use chainauth_keystore::{KeyStore, MemoryKeyStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryKeyStore::new();
//!     assert_eq!(store.initialize().await?, "0001");
//!     assert_eq!(store.rotate().await?, "0002");
//!
//!     // Old identifiers stay resolvable after rotation.
//!     let first = store.find_private_key("0001").await?;
//!     assert_eq!(first.public_key(), store.find_public_key("0001").await?);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    error::{KeyStoreError, Result},
    key::{FIRST_KEY_ID, KeySet, check_lockstep, next_key_id},
    material::{KeyPair, PrivateKey, PublicKey},
};

/// Persistence for paired, append-only signing key sets.
///
/// Lookups are read-only and safe to run concurrently. `initialize` and
/// `rotate` are serialized per store instance; serializing writers across
/// processes is left to the deployment.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Creates the storage location if needed and generates key `"0001"`
    /// when no key data exists yet.
    ///
    /// Returns the store's `maxid`. Calling this on a populated store is a
    /// no-op that returns the existing `maxid`.
    ///
    /// # Errors
    ///
    /// - [`KeyStoreError::StorageFailure`] if the location cannot be created,
    ///   read or written
    /// - [`KeyStoreError::KeyGenerationFailure`] if key generation fails
    /// - [`KeyStoreError::MalformedState`] if only one of the two stores holds
    ///   keys, or the stores disagree
    async fn initialize(&self) -> Result<String>;

    /// Appends a freshly generated key to both stores and returns its id.
    ///
    /// If either store is empty this behaves as [`initialize`](Self::initialize).
    ///
    /// # Errors
    ///
    /// - [`KeyStoreError::StorageFailure`] on read or write failure
    /// - [`KeyStoreError::MalformedState`] if `maxid` is not a non-negative
    ///   integer or the stores are out of lockstep
    /// - [`KeyStoreError::KeyGenerationFailure`] if key generation fails
    async fn rotate(&self) -> Result<String>;

    /// Looks up and decodes the private key stored under `kid`.
    ///
    /// # Errors
    ///
    /// - [`KeyStoreError::KeyNotFound`] if no entry matches or the match has
    ///   no algorithm recorded
    /// - [`KeyStoreError::StorageFailure`] if the store cannot be read
    /// - [`KeyStoreError::DecodeFailure`] if the material is not a valid key
    async fn find_private_key(&self, kid: &str) -> Result<PrivateKey>;

    /// Looks up and decodes the public key stored under `kid`.
    ///
    /// # Errors
    ///
    /// Same as [`find_private_key`](Self::find_private_key), against the
    /// public store.
    async fn find_public_key(&self, kid: &str) -> Result<PublicKey>;

    /// Returns the full public key set.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::StorageFailure`] if the store cannot be read.
    async fn public_key_set(&self) -> Result<KeySet>;
}

/// Outcome of planning a write against a pair of key sets.
#[derive(Debug)]
pub(crate) enum Plan {
    /// The stores already hold keys; nothing to write.
    Unchanged { max_id: String },
    /// Write both sets back; `kid` is the newly appended identifier.
    Append { private: KeySet, public: KeySet, kid: String },
}

/// Plans an initialization: generate `"0001"` if both sets are empty.
pub(crate) fn plan_initialize(private: KeySet, public: KeySet) -> Result<Plan> {
    match (private.is_empty(), public.is_empty()) {
        (true, true) => append_fresh(private, public, FIRST_KEY_ID.to_owned()),
        (false, false) => {
            check_lockstep(&private, &public)?;
            Ok(Plan::Unchanged { max_id: private.max_id })
        },
        (false, true) => Err(KeyStoreError::malformed(format!(
            "private store holds {} keys but public store is empty",
            private.len()
        ))),
        (true, false) => Err(KeyStoreError::malformed(format!(
            "public store holds {} keys but private store is empty",
            public.len()
        ))),
    }
}

/// Plans a rotation: append the key after `maxid` to both sets.
pub(crate) fn plan_rotate(private: KeySet, public: KeySet) -> Result<Plan> {
    if private.is_empty() || public.is_empty() {
        return plan_initialize(private, public);
    }
    check_lockstep(&private, &public)?;
    let kid = next_key_id(&private.max_id)?;
    if private.find(&kid).is_some() {
        return Err(KeyStoreError::malformed(format!("next key id '{kid}' is already taken")));
    }
    append_fresh(private, public, kid)
}

fn append_fresh(mut private: KeySet, mut public: KeySet, kid: String) -> Result<Plan> {
    let (private_entry, public_entry) = KeyPair::generate()?.into_entries(&kid);
    private.append(private_entry);
    public.append(public_entry);
    Ok(Plan::Append { private, public, kid })
}

/// Decodes the usable private key under `kid`.
pub(crate) fn decode_private(set: &KeySet, kid: &str) -> Result<PrivateKey> {
    PrivateKey::from_hex(set.usable(kid)?.material.as_str())
}

/// Decodes the usable public key under `kid`.
pub(crate) fn decode_public(set: &KeySet, kid: &str) -> Result<PublicKey> {
    PublicKey::from_hex(set.usable(kid)?.material.as_str())
}

#[derive(Debug, Default)]
struct Sets {
    private: KeySet,
    public: KeySet,
}

/// In-memory implementation of [`KeyStore`].
///
/// Keeps both key sets behind a single [`parking_lot::RwLock`], so a
/// rotation is atomic with respect to concurrent lookups. Nothing is
/// persisted; clones share the same underlying sets.
#[derive(Debug, Default, Clone)]
pub struct MemoryKeyStore {
    sets: Arc<RwLock<Sets>>,
}

impl MemoryKeyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given sets.
    ///
    /// The sets are taken as-is, without a lockstep check, so tests can
    /// model corrupt or placeholder state.
    #[must_use]
    pub fn with_key_sets(private: KeySet, public: KeySet) -> Self {
        Self { sets: Arc::new(RwLock::new(Sets { private, public })) }
    }

    /// Returns a copy of the private key set.
    #[must_use]
    pub fn private_key_set(&self) -> KeySet {
        self.sets.read().private.clone()
    }

    fn apply(&self, plan: impl FnOnce(KeySet, KeySet) -> Result<Plan>) -> Result<String> {
        let mut sets = self.sets.write();
        match plan(sets.private.clone(), sets.public.clone())? {
            Plan::Unchanged { max_id } => Ok(max_id),
            Plan::Append { private, public, kid } => {
                sets.private = private;
                sets.public = public;
                tracing::info!(kid = %kid, "Generated signing key");
                Ok(kid)
            },
        }
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    #[tracing::instrument(skip(self))]
    async fn initialize(&self) -> Result<String> {
        self.apply(plan_initialize)
    }

    #[tracing::instrument(skip(self))]
    async fn rotate(&self) -> Result<String> {
        self.apply(plan_rotate)
    }

    #[tracing::instrument(skip(self))]
    async fn find_private_key(&self, kid: &str) -> Result<PrivateKey> {
        decode_private(&self.sets.read().private, kid)
    }

    #[tracing::instrument(skip(self))]
    async fn find_public_key(&self, kid: &str) -> Result<PublicKey> {
        decode_public(&self.sets.read().public, kid)
    }

    #[tracing::instrument(skip(self))]
    async fn public_key_set(&self) -> Result<KeySet> {
        Ok(self.sets.read().public.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{
        assert_key_not_found, assert_malformed,
        key::{Key, KeyAlgorithm, KeyMaterial},
    };

    #[tokio::test]
    async fn test_initialize_generates_first_key() {
        let store = MemoryKeyStore::new();
        assert_eq!(store.initialize().await.unwrap(), "0001");

        let public = store.public_key_set().await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public.max_id, "0001");
        assert_eq!(store.private_key_set().max_id, "0001");
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let store = MemoryKeyStore::new();
        store.initialize().await.unwrap();
        store.rotate().await.unwrap();

        let before = store.private_key_set();
        assert_eq!(store.initialize().await.unwrap(), "0002");
        assert_eq!(store.private_key_set(), before);
    }

    #[tokio::test]
    async fn test_rotate_on_empty_store_initializes() {
        let store = MemoryKeyStore::new();
        assert_eq!(store.rotate().await.unwrap(), "0001");
        assert_eq!(store.rotate().await.unwrap(), "0002");
    }

    #[tokio::test]
    async fn test_rotation_preserves_history() {
        let store = MemoryKeyStore::new();
        store.initialize().await.unwrap();
        let first = store.find_private_key("0001").await.unwrap();

        for _ in 0..5 {
            store.rotate().await.unwrap();
        }

        assert_eq!(store.find_private_key("0001").await.unwrap(), first);
        assert_eq!(store.find_public_key("0001").await.unwrap(), first.public_key());
    }

    #[tokio::test]
    async fn test_find_private_key_unknown_kid() {
        let store = MemoryKeyStore::new();
        store.initialize().await.unwrap();
        assert_key_not_found!(store.find_private_key("9999").await);
    }

    #[tokio::test]
    async fn test_find_private_key_placeholder_entry() {
        let pair = KeyPair::generate().unwrap();
        let (mut private_entry, public_entry) = pair.into_entries("0001");
        private_entry.algorithm = KeyAlgorithm::Unset;

        let mut private = KeySet::default();
        let mut public = KeySet::default();
        private.append(private_entry);
        public.append(public_entry);

        let store = MemoryKeyStore::with_key_sets(private, public);
        assert_key_not_found!(store.find_private_key("0001").await);
        assert!(store.find_public_key("0001").await.is_ok());
    }

    #[tokio::test]
    async fn test_find_private_key_bad_material() {
        let mut private = KeySet::default();
        let mut public = KeySet::default();
        private.append(Key::es256("0001", KeyMaterial::new("not-hex")));
        public.append(Key::es256("0001", KeyMaterial::new("not-hex")));

        let store = MemoryKeyStore::with_key_sets(private, public);
        assert!(matches!(
            store.find_private_key("0001").await,
            Err(KeyStoreError::DecodeFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_rotate_rejects_malformed_max_id() {
        let store = MemoryKeyStore::new();
        store.initialize().await.unwrap();

        let mut private = store.private_key_set();
        let mut public = store.public_key_set().await.unwrap();
        private.max_id = "abc".into();
        public.max_id = "abc".into();
        private.keys[0].kid = "abc".into();
        public.keys[0].kid = "abc".into();

        let corrupt = MemoryKeyStore::with_key_sets(private, public);
        assert_malformed!(corrupt.rotate().await);
    }

    #[tokio::test]
    async fn test_half_populated_store_is_malformed() {
        let store = MemoryKeyStore::new();
        store.initialize().await.unwrap();

        let half = MemoryKeyStore::with_key_sets(store.private_key_set(), KeySet::default());
        assert_malformed!(half.initialize().await);
        assert_malformed!(half.rotate().await);
        // Nothing was overwritten.
        assert_eq!(half.private_key_set(), store.private_key_set());
    }

    #[tokio::test]
    async fn test_concurrent_rotations_do_not_lose_updates() {
        let store = MemoryKeyStore::new();
        store.initialize().await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.rotate().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let public = store.public_key_set().await.unwrap();
        assert_eq!(public.len(), 9);
        assert_eq!(public.max_id, "0009");
    }
}
