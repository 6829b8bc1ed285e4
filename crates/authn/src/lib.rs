//! # chainauth authentication
//!
//! Issues short-lived ES256 bearer tokens to the sender of an on-chain
//! transaction, and verifies them.
//!
//! This crate provides:
//! - **Issuance**: [`TokenIssuer`] signs [`Claims`] with a key from a
//!   [`chainauth_keystore::KeyStore`]
//! - **Authentication flow**: [`Authenticator`] resolves a transaction to
//!   its sender, bounded by a timeout and a cancellation token, then issues
//! - **Verification**: [`jwt::verify_token`] checks algorithm, key id,
//!   signature and expiry against the public key set
//!
//! Only ES256 is accepted. Symmetric algorithms and `none` are rejected
//! before any key lookup.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chainauth_authn::{AuthorizationClaims, Authenticator, TokenIssuer};
//! use chainauth_keystore::{FileKeyStore, KeyStore};
//! use chainauth_resolver::{JsonRpcResolver, ResolverConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(FileKeyStore::new("keys"));
//! let kid = store.initialize().await?;
//!
//! let authenticator = Authenticator::builder()
//!     .resolver(Arc::new(JsonRpcResolver::new(ResolverConfig::default())?))
//!     .issuer(TokenIssuer::new(store))
//!     .build();
//!
//! let token = authenticator
//!     .authenticate("0x88df…", &kid, &AuthorizationClaims::default(), &CancellationToken::new())
//!     .await?;
//! println!("{}", token.access_token);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Token payloads and the issuer response.
pub mod claims;
/// Authentication error types.
pub mod error;
/// The authenticate-then-issue flow.
pub mod flow;
/// Token issuance.
pub mod issuer;
/// Token decoding and verification.
pub mod jwt;
/// Shared test utilities.
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
/// Header validation.
pub mod validation;

pub use claims::{AuthToken, AuthorizationClaims, Claims, TOKEN_LIFETIME, TokenType};
pub use error::{AuthError, ErrorCategory, Result};
pub use flow::{Authenticator, DEFAULT_RESOLVE_TIMEOUT};
pub use issuer::TokenIssuer;
pub use jwt::verify_token;
pub use validation::{ACCEPTED_ALGORITHMS, FORBIDDEN_ALGORITHMS, validate_algorithm};
