//! Shared test utilities for authentication testing.
//!
//! Helpers for building issuers over populated stores, signing arbitrary
//! payloads with a store key, crafting raw JWT strings for attack tests,
//! and counting key store access. Feature-gated behind `testutil`:
//!
//! ```toml
//! [dev-dependencies]
//! chainauth-authn = { path = "../authn", features = ["testutil"] }
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chainauth_keystore::{
    KeySet, KeyStore, MemoryKeyStore, PrivateKey, PublicKey, testutil::populated_store,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};

use crate::issuer::TokenIssuer;

/// Wraps a [`KeyStore`] and counts every call made through it.
pub struct CountingKeyStore<S> {
    inner: S,
    calls: AtomicUsize,
}

impl<S: KeyStore> CountingKeyStore<S> {
    /// Wraps `inner`.
    pub fn new(inner: S) -> Self {
        Self { inner, calls: AtomicUsize::new(0) }
    }

    /// Number of store operations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: KeyStore> KeyStore for CountingKeyStore<S> {
    async fn initialize(&self) -> chainauth_keystore::Result<String> {
        self.hit();
        self.inner.initialize().await
    }

    async fn rotate(&self) -> chainauth_keystore::Result<String> {
        self.hit();
        self.inner.rotate().await
    }

    async fn find_private_key(&self, kid: &str) -> chainauth_keystore::Result<PrivateKey> {
        self.hit();
        self.inner.find_private_key(kid).await
    }

    async fn find_public_key(&self, kid: &str) -> chainauth_keystore::Result<PublicKey> {
        self.hit();
        self.inner.find_public_key(kid).await
    }

    async fn public_key_set(&self) -> chainauth_keystore::Result<KeySet> {
        self.hit();
        self.inner.public_key_set().await
    }
}

/// Creates a store with `count` keys and an issuer over it.
pub async fn issuer_with_keys(count: usize) -> (Arc<MemoryKeyStore>, TokenIssuer) {
    let store = Arc::new(populated_store(count).await);
    let issuer = TokenIssuer::new(store.clone());
    (store, issuer)
}

/// Signs an arbitrary JSON payload with ES256 under `kid`.
///
/// # Panics
///
/// Panics if encoding fails.
pub fn sign_raw(key: &PrivateKey, kid: &str, payload: &serde_json::Value) -> String {
    let der = key.to_pkcs8_der().expect("pkcs8 encoding");
    let mut header = Header::new(Algorithm::ES256);
    header.kid = Some(kid.to_owned());
    jsonwebtoken::encode(&header, payload, &EncodingKey::from_ec_der(&der))
        .expect("Failed to encode test JWT")
}

/// Creates a raw JWT string from arbitrary header and payload JSON.
///
/// The result is `{header_b64}.{payload_b64}.` with an empty signature,
/// for testing rejection of malformed or attack tokens.
///
/// # Panics
///
/// Panics if JSON serialization fails.
pub fn craft_raw_jwt(header_json: &serde_json::Value, payload_json: &serde_json::Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header_json).expect("header json"));
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload_json).expect("payload json"));
    format!("{header_b64}.{payload_b64}.")
}

/// Asserts that a [`Result<T, AuthError>`](crate::error::Result) is an
/// `Err` matching the given [`AuthError`](crate::error::AuthError) variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use chainauth_authn::assert_auth_error;
/// use chainauth_authn::error::AuthError;
///
/// let result: Result<(), AuthError> = Err(AuthError::TokenExpired);
/// assert_auth_error!(result, TokenExpired);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {{
        let result = $result;
        assert!(
            matches!(result, Err($crate::error::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            result,
        );
    }};
    ($result:expr, $variant:ident, $msg:expr) => {{
        let result = $result;
        assert!(
            matches!(result, Err($crate::error::AuthError::$variant { .. })),
            "{}: expected AuthError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            result,
        );
    }};
}
