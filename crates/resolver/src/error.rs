//! Identity resolution errors.

use std::sync::Arc;

use thiserror::Error;

/// A shared error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for resolver operations.
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Errors returned while resolving a transaction to its sender.
///
/// None of these are retried internally; the caller owns retry policy.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; downstream match expressions
/// must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// The input is not a `0x`-prefixed 32-byte hex hash.
    #[error("Invalid transaction hash: {hash}")]
    InvalidTransactionHash {
        /// The rejected input.
        hash: String,
    },

    /// The node has no transaction with this hash.
    #[error("Transaction not found: {hash}")]
    TransactionNotFound {
        /// The hash that was looked up.
        hash: String,
    },

    /// The node could not be reached or returned an unusable response.
    #[error("Network failure: {message}")]
    NetworkFailure {
        /// Description of the failure.
        message: String,
        /// The underlying transport error.
        #[source]
        source: Option<BoxError>,
    },

    /// The node answered with a JSON-RPC error object.
    #[error("Node returned error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// The transaction's sender could not be determined.
    #[error("Sender recovery failed: {0}")]
    SignatureRecoveryFailure(String),

    /// The transaction belongs to a different chain than configured.
    #[error("Chain mismatch: expected {expected}, transaction is on {actual}")]
    ChainMismatch {
        /// Configured chain id.
        expected: u64,
        /// Chain id reported for the transaction.
        actual: u64,
    },

    /// Resolver configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ResolveError {
    /// Creates a new `NetworkFailure` error with the given message.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkFailure { message: message.into(), source: None }
    }

    /// Creates a new `NetworkFailure` error with a message and source error.
    #[must_use]
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::NetworkFailure { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `TransactionNotFound` error.
    #[must_use]
    pub fn not_found(hash: impl Into<String>) -> Self {
        Self::TransactionNotFound { hash: hash.into() }
    }

    /// Creates a new `SignatureRecoveryFailure` error.
    #[must_use]
    pub fn recovery(message: impl Into<String>) -> Self {
        Self::SignatureRecoveryFailure(message.into())
    }

    /// Returns `true` if the caller supplied a transaction that can never
    /// resolve, as opposed to a node or network problem.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransactionHash { .. }
                | Self::TransactionNotFound { .. }
                | Self::SignatureRecoveryFailure(_)
                | Self::ChainMismatch { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(ResolveError::not_found("0xab").to_string(), "Transaction not found: 0xab");
        assert_eq!(
            ResolveError::ChainMismatch { expected: 1, actual: 3 }.to_string(),
            "Chain mismatch: expected 1, transaction is on 3"
        );
    }

    #[test]
    fn test_caller_errors() {
        assert!(ResolveError::not_found("0xab").is_caller_error());
        assert!(ResolveError::recovery("no sender").is_caller_error());
        assert!(!ResolveError::network("refused").is_caller_error());
        assert!(!ResolveError::Rpc { code: -32000, message: "busy".into() }.is_caller_error());
    }
}
