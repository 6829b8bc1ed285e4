//! # chainauth key store
//!
//! Append-only storage for the ES256 (ECDSA P-256) key pairs that sign
//! bearer tokens.
//!
//! Keys live in two paired sets: private material for signing and public
//! material for verification. Both sets hold the same zero-padded decimal
//! identifiers (`"0001"`, `"0002"`, ...) and a `maxid` naming the most
//! recently appended key. Rotation only ever appends, so tokens signed under
//! an old identifier stay verifiable.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              KeyStore trait                  │
//! │ initialize, rotate, find_private_key, ...    │
//! ├──────────────────────┬───────────────────────┤
//! │    FileKeyStore      │    MemoryKeyStore     │
//! │ private.json (0600)  │  RwLock<(priv, pub)>  │
//! │ public.json  (0644)  │      (testing)        │
//! └──────────────────────┴───────────────────────┘
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with store factories and
//!   assertion macros for integration tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod file;
pub mod key;
pub mod material;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

pub use error::{BoxError, KeyStoreError, Result};
pub use file::{DEFAULT_KEY_DIR, FileKeyStore, PRIVATE_KEY_FILE, PUBLIC_KEY_FILE};
pub use key::{FIRST_KEY_ID, Key, KeyAlgorithm, KeyMaterial, KeySet, KeyType};
pub use material::{KeyPair, PrivateKey, PublicKey};
pub use store::{KeyStore, MemoryKeyStore};
