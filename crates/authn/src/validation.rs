//! JWT header validation.
//!
//! Checks run before any key lookup: the algorithm must be ES256 and the
//! key id must look like a key store identifier.

use crate::error::AuthError;

/// Forbidden JWT algorithms that are never accepted.
///
/// - `none`: no signature at all
/// - `HS256`, `HS384`, `HS512`: symmetric, the verifier would need the secret
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Accepted JWT algorithms. Keys in the store are P-256 only.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["ES256"];

/// Longest key id accepted from a token header.
pub const MAX_KID_LEN: usize = 20;

/// Validate a JWT algorithm name.
///
/// # Errors
///
/// Returns [`AuthError::UnsupportedAlgorithm`] if the algorithm is
/// forbidden or not in [`ACCEPTED_ALGORITHMS`].
///
/// # Examples
///
/// ```
/// use chainauth_authn::validation::validate_algorithm;
///
/// assert!(validate_algorithm("ES256").is_ok());
/// assert!(validate_algorithm("HS256").is_err());
/// assert!(validate_algorithm("EdDSA").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<(), AuthError> {
    if FORBIDDEN_ALGORITHMS.contains(&alg) {
        return Err(AuthError::UnsupportedAlgorithm(format!(
            "Algorithm '{alg}' is not allowed for security reasons"
        )));
    }

    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(AuthError::UnsupportedAlgorithm(format!(
            "Algorithm '{alg}' is not in accepted list (only ES256 is supported)"
        )));
    }

    Ok(())
}

/// Validate a key id taken from a token header.
///
/// Key ids are zero-padded decimal counters, so anything else is rejected
/// before it reaches the store.
///
/// # Errors
///
/// Returns [`AuthError::InvalidTokenFormat`] if the id is empty, too long,
/// or contains anything but ASCII digits.
pub fn validate_kid(kid: &str) -> Result<(), AuthError> {
    if kid.is_empty() {
        return Err(AuthError::invalid_token_format("kid is empty"));
    }
    if kid.len() > MAX_KID_LEN {
        return Err(AuthError::invalid_token_format(format!(
            "kid exceeds {MAX_KID_LEN} characters"
        )));
    }
    if !kid.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AuthError::invalid_token_format(format!("kid '{kid}' is not numeric")));
    }
    Ok(())
}
