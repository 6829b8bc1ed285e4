//! Authentication error types.
//!
//! Errors from issuing and verifying tokens. Each error maps to an
//! [`ErrorCategory`] so a transport layer can pick a response class
//! without matching on every variant.

use std::time::Duration;

use chainauth_keystore::KeyStoreError;
use chainauth_resolver::ResolveError;
use thiserror::Error;

/// Broad classes of failure, as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transient storage or network trouble; the same request may succeed
    /// later (5xx).
    RetryLater,
    /// The caller referenced a transaction that cannot authenticate anyone
    /// (4xx).
    BadRequest,
    /// The presented token is not acceptable (401).
    Unauthorized,
    /// The service cannot issue with the requested key (5xx, operator
    /// action needed).
    Misconfiguration,
}

/// Authentication and token errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; downstream match expressions
/// must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    // ========== Issuance ==========
    /// No usable signing key exists under the requested id.
    #[error("Signing key unavailable: {kid}")]
    KeyUnavailable {
        /// The key id that was requested.
        kid: String,
        /// Why the key is unusable.
        #[source]
        source: KeyStoreError,
    },

    /// The key store could not be read.
    ///
    /// Wraps the original [`KeyStoreError`] to preserve the source chain.
    #[error("Key storage error: {0}")]
    KeyStorage(#[source] KeyStoreError),

    /// Signing the token failed.
    #[error("Signing failed: {0}")]
    SigningFailure(String),

    // ========== Identity resolution ==========
    /// The transaction could not be resolved to a sender.
    #[error("Identity resolution failed: {0}")]
    Resolution(#[from] ResolveError),

    /// Identity resolution did not finish in time.
    #[error("Identity resolution timed out after {0:?}")]
    ResolutionTimeout(Duration),

    /// The request was cancelled before a token was issued.
    #[error("Request cancelled")]
    Cancelled,

    // ========== Verification ==========
    /// Malformed token; cannot be decoded.
    #[error("Invalid token format: {0}")]
    InvalidTokenFormat(String),

    /// Token header carries no `kid`.
    #[error("Token header missing key id")]
    MissingKeyId,

    /// Token names a key id the verifier does not hold.
    #[error("Unknown signing key: {kid}")]
    UnknownSigningKey {
        /// The key id named in the token header.
        kid: String,
    },

    /// Signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// Algorithm not in the accepted list.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

impl AuthError {
    /// Creates a new `InvalidTokenFormat` error.
    #[must_use]
    pub fn invalid_token_format(message: impl Into<String>) -> Self {
        Self::InvalidTokenFormat(message.into())
    }

    /// Creates a new `SigningFailure` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::SigningFailure(message.into())
    }

    /// Maps a key store failure during issuance.
    ///
    /// Missing, placeholder, undecodable or inconsistent keys make the
    /// requested id unavailable; I/O failures stay retryable.
    #[must_use]
    pub fn from_issuing_key(kid: &str, err: KeyStoreError) -> Self {
        match err {
            KeyStoreError::StorageFailure { .. } => Self::KeyStorage(err),
            _ => Self::KeyUnavailable { kid: kid.to_owned(), source: err },
        }
    }

    /// Maps a key store failure during verification.
    #[must_use]
    pub fn from_verifying_key(kid: &str, err: KeyStoreError) -> Self {
        match err {
            KeyStoreError::KeyNotFound { .. } => Self::UnknownSigningKey { kid: kid.to_owned() },
            KeyStoreError::StorageFailure { .. } => Self::KeyStorage(err),
            _ => Self::KeyUnavailable { kid: kid.to_owned(), source: err },
        }
    }

    /// The response class this error belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::KeyStorage(_) | Self::ResolutionTimeout(_) | Self::Cancelled => {
                ErrorCategory::RetryLater
            },
            Self::Resolution(ResolveError::Config(_)) => ErrorCategory::Misconfiguration,
            Self::Resolution(e) if e.is_caller_error() => ErrorCategory::BadRequest,
            Self::Resolution(_) => ErrorCategory::RetryLater,
            Self::KeyUnavailable { .. } | Self::SigningFailure(_) => ErrorCategory::Misconfiguration,
            Self::InvalidTokenFormat(_)
            | Self::MissingKeyId
            | Self::UnknownSigningKey { .. }
            | Self::InvalidSignature
            | Self::TokenExpired
            | Self::UnsupportedAlgorithm(_) => ErrorCategory::Unauthorized,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidToken => AuthError::invalid_token_format("Invalid JWT structure"),
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidAlgorithm => {
                AuthError::UnsupportedAlgorithm("Algorithm not supported".into())
            },
            _ => AuthError::invalid_token_format(format!("JWT error: {err}")),
        }
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
