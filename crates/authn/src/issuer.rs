//! Token issuance.

use std::sync::Arc;

use chainauth_keystore::KeyStore;
use chainauth_resolver::Address;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};

use crate::{
    claims::{AuthToken, AuthorizationClaims, Claims, TOKEN_LIFETIME, TokenType},
    error::{AuthError, Result},
};

/// Signs short-lived ES256 tokens for resolved senders.
///
/// Reads private keys from the store; never writes to it.
#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn KeyStore>,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Creates an issuer over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }

    /// Issues a token for `sender`, signed with key `kid`, expiring
    /// [`TOKEN_LIFETIME`] from now.
    ///
    /// # Errors
    ///
    /// - [`AuthError::KeyUnavailable`] if `kid` is missing or unusable
    /// - [`AuthError::KeyStorage`] if the store cannot be read
    /// - [`AuthError::SigningFailure`] if signing fails
    pub async fn issue(
        &self,
        kid: &str,
        sender: &Address,
        claims: &AuthorizationClaims,
    ) -> Result<AuthToken> {
        self.issue_at(kid, sender, claims, Utc::now()).await
    }

    /// [`issue`](Self::issue) with [`AuthorizationClaims::default`].
    ///
    /// # Errors
    ///
    /// Same as [`issue`](Self::issue).
    pub async fn issue_default(&self, kid: &str, sender: &Address) -> Result<AuthToken> {
        self.issue(kid, sender, &AuthorizationClaims::default()).await
    }

    /// [`issue`](Self::issue) with an explicit issue time.
    ///
    /// # Errors
    ///
    /// Same as [`issue`](Self::issue).
    #[tracing::instrument(skip(self, sender, claims, now), fields(uid = %sender))]
    pub async fn issue_at(
        &self,
        kid: &str,
        sender: &Address,
        claims: &AuthorizationClaims,
        now: DateTime<Utc>,
    ) -> Result<AuthToken> {
        let lifetime = i64::try_from(TOKEN_LIFETIME.as_secs()).unwrap_or(i64::MAX);
        let expires_at = now.timestamp().saturating_add(lifetime);
        let payload = Claims::new(sender.to_string(), expires_at, claims);

        let key = self.store.find_private_key(kid).await.map_err(|e| {
            tracing::warn!(kid = %kid, error = %e, "Signing key unavailable");
            AuthError::from_issuing_key(kid, e)
        })?;

        let der = key.to_pkcs8_der().map_err(|e| AuthError::from_issuing_key(kid, e))?;
        let encoding_key = EncodingKey::from_ec_der(&der);

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(kid.to_owned());

        let access_token = encode(&header, &payload, &encoding_key)
            .map_err(|e| AuthError::signing(format!("failed to sign token: {e}")))?;

        tracing::info!(kid = %kid, expires_at, "Issued token");
        Ok(AuthToken { token_type: TokenType::Bearer, access_token, expires_in: expires_at })
    }
}
