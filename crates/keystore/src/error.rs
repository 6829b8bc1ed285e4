//! Key store error types and result alias.
//!
//! Every backend maps its failures onto [`KeyStoreError`] so callers can
//! distinguish transient storage problems from corrupt state and from
//! lookups that simply have no usable key.
//!
//! # Example
//!
//! ```
//! use chainauth_keystore::{KeyStoreError, Result};
//!
//! fn lookup(kid: &str) -> Result<()> {
//!     Err(KeyStoreError::key_not_found(kid))
//! }
//!
//! assert!(lookup("9999").is_err());
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A shared error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for key store operations.
pub type Result<T> = std::result::Result<T, KeyStoreError>;

/// Errors that can occur while generating, persisting or looking up keys.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; downstream match expressions
/// must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeyStoreError {
    /// The backing storage could not be created, read or written.
    ///
    /// This is usually transient (disk full, permissions changed under us)
    /// and callers may retry.
    #[error("Key storage failure: {message}")]
    StorageFailure {
        /// Description of the failed operation.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: Option<BoxError>,
    },

    /// Secure key generation failed (entropy source or curve failure).
    #[error("Key generation failed: {message}")]
    KeyGenerationFailure {
        /// Description of the generation failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The stored key sets are corrupt or inconsistent with each other.
    ///
    /// Covers an unparseable `maxid`, unparseable store contents, and
    /// private/public stores that have drifted out of lockstep.
    #[error("Malformed key store: {message}")]
    MalformedState {
        /// Description of the inconsistency.
        message: String,
    },

    /// No usable key exists under the requested identifier.
    #[error("Key not found: {kid}")]
    KeyNotFound {
        /// The key identifier that was looked up.
        kid: String,
    },

    /// Stored key material does not decode to a valid P-256 key.
    #[error("Key decode failed: {message}")]
    DecodeFailure {
        /// Description of the decoding failure.
        message: String,
        /// The underlying decoding error.
        #[source]
        source: Option<BoxError>,
    },
}

impl KeyStoreError {
    /// Creates a new `StorageFailure` error with a message and I/O source.
    #[must_use]
    pub fn storage(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::StorageFailure { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `KeyGenerationFailure` error with the given message.
    #[must_use]
    pub fn generation(message: impl Into<String>) -> Self {
        Self::KeyGenerationFailure { message: message.into(), source: None }
    }

    /// Creates a new `KeyGenerationFailure` error with a message and source error.
    #[must_use]
    pub fn generation_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::KeyGenerationFailure { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `MalformedState` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedState { message: message.into() }
    }

    /// Creates a new `KeyNotFound` error for the given key identifier.
    #[must_use]
    pub fn key_not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    /// Creates a new `DecodeFailure` error with the given message.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::DecodeFailure { message: message.into(), source: None }
    }

    /// Creates a new `DecodeFailure` error with a message and source error.
    #[must_use]
    pub fn decode_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DecodeFailure { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Returns `true` if the failure is transient and the operation may be
    /// retried later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StorageFailure { .. })
    }
}
