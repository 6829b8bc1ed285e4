//! Token decoding and verification.
//!
//! Verification against a [`KeyStore`] runs in this order, failing fast:
//!
//! ```text
//! header alg ──► validate_algorithm ──► kid present ──► validate_kid
//!      ──► find_public_key(kid) ──► ES256 signature + exp ──► Claims
//! ```
//!
//! # Example
//!
//! ```no_run
//! use chainauth_authn::jwt::verify_token;
//! use chainauth_keystore::MemoryKeyStore;
//!
//! # async fn example(token: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryKeyStore::new();
//! let claims = verify_token(token, &store).await?;
//! println!("Authenticated: {}", claims.user_id);
//! # Ok(())
//! # }
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chainauth_keystore::{KeyStore, PublicKey};
use jsonwebtoken::{Algorithm, DecodingKey, Header, Validation, decode, decode_header};
use serde::Deserialize;

use crate::{
    claims::Claims,
    error::{AuthError, Result},
    validation::{validate_algorithm, validate_kid},
};

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

fn segments(token: &str) -> Result<[&str; 3]> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None) => Ok([header, payload, signature]),
        _ => Err(AuthError::invalid_token_format("JWT must have 3 parts separated by dots")),
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str, what: &str) -> Result<T> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        AuthError::invalid_token_format(format!("Failed to decode JWT {what}: {e}"))
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::invalid_token_format(format!("Failed to parse JWT {what}: {e}")))
}

/// Reads the `alg` header member as written, including names the JWT
/// library cannot represent (such as `none`).
fn raw_algorithm(token: &str) -> Result<String> {
    let [header, _, _] = segments(token)?;
    decode_segment::<RawHeader>(header, "header").map(|h| h.alg)
}

/// Decode the JWT header without verification.
///
/// # Errors
///
/// Returns [`AuthError::InvalidTokenFormat`] if the header cannot be decoded.
pub fn decode_token_header(token: &str) -> Result<Header> {
    decode_header(token)
        .map_err(|e| AuthError::invalid_token_format(format!("Failed to decode JWT header: {e}")))
}

/// Decode the JWT claims without verification.
///
/// # Errors
///
/// Returns [`AuthError::InvalidTokenFormat`] if the token does not have
/// three parts or the payload is not a valid claims object.
pub fn decode_token_claims(token: &str) -> Result<Claims> {
    let [_, payload, _] = segments(token)?;
    decode_segment(payload, "payload")
}

/// Verify an ES256 signature and expiry against `key`.
///
/// No leeway is applied to `exp`.
///
/// # Errors
///
/// Returns [`AuthError::InvalidSignature`], [`AuthError::TokenExpired`] or
/// [`AuthError::InvalidTokenFormat`] depending on what fails.
pub fn verify_signature(token: &str, key: &PublicKey) -> Result<Claims> {
    let (x, y) = key.jwk_coordinates();
    let decoding_key = DecodingKey::from_ec_components(&x, &y)?;

    let mut validation = Validation::new(Algorithm::ES256);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    Ok(decode::<Claims>(token, &decoding_key, &validation)?.claims)
}

/// Verify a token against the public keys in `store`.
///
/// # Errors
///
/// Returns an error if:
/// - The token is malformed or its header carries no `kid`
/// - The algorithm is not in [`crate::validation::ACCEPTED_ALGORITHMS`]
/// - No usable public key exists under the `kid`
/// - The signature is invalid or the token has expired
#[tracing::instrument(skip(token, store))]
pub async fn verify_token(token: &str, store: &dyn KeyStore) -> Result<Claims> {
    validate_algorithm(&raw_algorithm(token)?)?;

    let header = decode_token_header(token)?;
    let kid = header.kid.ok_or(AuthError::MissingKeyId)?;
    validate_kid(&kid)?;

    let key = store.find_public_key(&kid).await.map_err(|e| {
        tracing::warn!(kid = %kid, error = %e, "Failed to load verification key");
        AuthError::from_verifying_key(&kid, e)
    })?;

    let claims = verify_signature(token, &key)?;
    tracing::debug!(kid = %kid, uid = %claims.user_id, "Token verified");
    Ok(claims)
}
