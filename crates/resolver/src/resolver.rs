//! The identity resolution boundary.

use async_trait::async_trait;

use crate::{error::Result, types::Address};

/// Turns a transaction reference into the address that signed it.
///
/// The returned address is the authenticated identity: whoever controls it
/// was able to sign the referenced transaction.
///
/// Implementations must not retry internally; every failure is surfaced.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolves `tx_ref` (a `0x`-prefixed transaction hash) to its sender.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::InvalidTransactionHash`] if `tx_ref` is not a hash
    /// - [`ResolveError::TransactionNotFound`] if the node does not know it
    /// - [`ResolveError::NetworkFailure`] if the node is unreachable
    /// - [`ResolveError::SignatureRecoveryFailure`] if no sender can be
    ///   recovered
    ///
    /// [`ResolveError::InvalidTransactionHash`]: crate::ResolveError::InvalidTransactionHash
    /// [`ResolveError::TransactionNotFound`]: crate::ResolveError::TransactionNotFound
    /// [`ResolveError::NetworkFailure`]: crate::ResolveError::NetworkFailure
    /// [`ResolveError::SignatureRecoveryFailure`]: crate::ResolveError::SignatureRecoveryFailure
    async fn resolve(&self, tx_ref: &str) -> Result<Address>;
}

