//! The authenticate-then-issue flow.
//!
//! ```text
//! authenticate(tx, kid)
//!   ├─ cancelled ──────────────────────────────► Cancelled
//!   ├─ resolve(tx) within resolve_timeout
//!   │    ├─ elapsed ───────────────────────────► ResolutionTimeout
//!   │    ├─ Err(e) ────────────────────────────► Resolution(e)   (store untouched)
//!   │    └─ Ok(sender)
//!   ├─ cancelled ──────────────────────────────► Cancelled
//!   └─ issue(kid, sender) ─────────────────────► AuthToken
//! ```

use std::{sync::Arc, time::Duration};

use chainauth_resolver::IdentityResolver;
use tokio_util::sync::CancellationToken;

use crate::{
    claims::{AuthToken, AuthorizationClaims},
    error::{AuthError, Result},
    issuer::TokenIssuer,
};

/// Default upper bound on a single resolution.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(15);

/// Resolves a transaction to its sender and issues a token for it.
pub struct Authenticator {
    resolver: Arc<dyn IdentityResolver>,
    issuer: TokenIssuer,
    resolve_timeout: Duration,
}

#[bon::bon]
impl Authenticator {
    /// Creates an authenticator.
    #[builder]
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        issuer: TokenIssuer,
        #[builder(default = DEFAULT_RESOLVE_TIMEOUT)] resolve_timeout: Duration,
    ) -> Self {
        Self { resolver, issuer, resolve_timeout }
    }
}

impl Authenticator {
    /// Authenticates the sender of `tx_ref` and issues a token under `kid`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Resolution`] if the resolver fails; the key store is
    ///   not consulted
    /// - [`AuthError::ResolutionTimeout`] if resolution exceeds the timeout
    /// - [`AuthError::Cancelled`] if `cancel` fires before issuance
    /// - any error from [`TokenIssuer::issue`]
    #[tracing::instrument(skip(self, claims, cancel))]
    pub async fn authenticate(
        &self,
        tx_ref: &str,
        kid: &str,
        claims: &AuthorizationClaims,
        cancel: &CancellationToken,
    ) -> Result<AuthToken> {
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }

        let sender = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AuthError::Cancelled),
            outcome = tokio::time::timeout(self.resolve_timeout, self.resolver.resolve(tx_ref)) => {
                match outcome {
                    Ok(resolved) => resolved?,
                    Err(_) => {
                        tracing::warn!(timeout = ?self.resolve_timeout, "Identity resolution timed out");
                        return Err(AuthError::ResolutionTimeout(self.resolve_timeout));
                    },
                }
            },
        };

        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }

        self.issuer.issue(kid, &sender, claims).await
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("issuer", &self.issuer)
            .field("resolve_timeout", &self.resolve_timeout)
            .finish_non_exhaustive()
    }
}
