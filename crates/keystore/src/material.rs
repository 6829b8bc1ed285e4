//! P-256 key material: generation, hex codecs and JOSE helpers.
//!
//! Private keys are stored as the 32-byte big-endian scalar, public keys as
//! the 65-byte uncompressed SEC1 point (`04 || X || Y`), both hex-encoded.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use p256::{elliptic_curve::sec1::ToEncodedPoint, pkcs8::EncodePrivateKey};
use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

use crate::{
    error::{KeyStoreError, Result},
    key::{Key, KeyMaterial},
};

/// Length of a raw P-256 private scalar.
pub const PRIVATE_KEY_LEN: usize = 32;

/// Length of an uncompressed SEC1 P-256 point.
pub const PUBLIC_KEY_LEN: usize = 65;

/// Attempts before giving up on drawing a scalar in range. The chance of
/// a single draw falling outside `[1, n)` is about 2^-32.
const MAX_GENERATION_ATTEMPTS: usize = 8;

/// A decoded P-256 signing key.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    inner: p256::SecretKey,
}

impl PrivateKey {
    /// Generates a fresh key from the operating system's CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::KeyGenerationFailure`] if the entropy source
    /// fails or never yields a valid scalar.
    pub fn generate() -> Result<Self> {
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let mut bytes = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
            OsRng
                .try_fill_bytes(&mut bytes[..])
                .map_err(|e| KeyStoreError::generation_with_source("entropy source failed", e))?;

            if let Ok(inner) = p256::SecretKey::from_slice(&bytes[..]) {
                return Ok(Self { inner });
            }
        }
        Err(KeyStoreError::generation("no valid P-256 scalar drawn from entropy source"))
    }

    /// Decodes a hex-encoded 32-byte scalar.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::DecodeFailure`] if the input is not hex, has
    /// the wrong length, or is not a valid scalar for the curve.
    pub fn from_hex(material: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(material)
                .map_err(|e| KeyStoreError::decode_with_source("private key is not valid hex", e))?,
        );
        if bytes.len() != PRIVATE_KEY_LEN {
            return Err(KeyStoreError::decode(format!(
                "private key must be {PRIVATE_KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let inner = p256::SecretKey::from_slice(&bytes)
            .map_err(|e| KeyStoreError::decode_with_source("private key is not a valid P-256 scalar", e))?;
        Ok(Self { inner })
    }

    /// Hex encoding of the raw scalar.
    #[must_use]
    pub fn to_hex(&self) -> KeyMaterial {
        let mut bytes = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        bytes.copy_from_slice(&self.inner.to_bytes());
        KeyMaterial::new(hex::encode(&bytes[..]))
    }

    /// Returns the matching public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey { inner: self.inner.public_key() }
    }

    /// PKCS#8 DER encoding, as expected by JWT signing libraries.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::DecodeFailure`] if the key cannot be encoded.
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let document = self
            .inner
            .to_pkcs8_der()
            .map_err(|e| KeyStoreError::decode(format!("PKCS#8 encoding failed: {e}")))?;
        Ok(Zeroizing::new(document.as_bytes().to_vec()))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey").field("public", &self.public_key()).finish_non_exhaustive()
    }
}

/// A decoded P-256 verification key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    inner: p256::PublicKey,
}

impl PublicKey {
    /// Decodes a hex-encoded uncompressed SEC1 point.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::DecodeFailure`] if the input is not hex, is
    /// not an uncompressed point, or is not on the curve.
    pub fn from_hex(material: &str) -> Result<Self> {
        let bytes = hex::decode(material)
            .map_err(|e| KeyStoreError::decode_with_source("public key is not valid hex", e))?;
        if bytes.len() != PUBLIC_KEY_LEN || bytes[0] != 0x04 {
            return Err(KeyStoreError::decode(format!(
                "public key must be a {PUBLIC_KEY_LEN}-byte uncompressed point"
            )));
        }
        let inner = p256::PublicKey::from_sec1_bytes(&bytes)
            .map_err(|e| KeyStoreError::decode_with_source("public key is not on P-256", e))?;
        Ok(Self { inner })
    }

    /// Hex encoding of the uncompressed point.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.inner.to_encoded_point(false).as_bytes())
    }

    /// Affine coordinates as base64url strings without padding, in the form
    /// used by the `x`/`y` members of an EC JWK.
    #[must_use]
    pub fn jwk_coordinates(&self) -> (String, String) {
        let point = self.inner.to_encoded_point(false);
        let x = point.x().map(|x| URL_SAFE_NO_PAD.encode(x)).unwrap_or_default();
        let y = point.y().map(|y| URL_SAFE_NO_PAD.encode(y)).unwrap_or_default();
        (x, y)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_hex()).finish()
    }
}

/// A freshly generated key pair, ready to be appended to both stores.
#[derive(Debug, Clone)]
pub struct KeyPair {
    private: PrivateKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generates a new pair.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::KeyGenerationFailure`] if generation fails.
    pub fn generate() -> Result<Self> {
        let private = PrivateKey::generate()?;
        let public = private.public_key();
        Ok(Self { private, public })
    }

    /// Builds the `(private, public)` store entries for identifier `kid`.
    #[must_use]
    pub fn into_entries(self, kid: &str) -> (Key, Key) {
        let private = Key::es256(kid, self.private.to_hex());
        let public = Key::es256(kid, KeyMaterial::new(self.public.to_hex()));
        (private, public)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_generated_keys_are_distinct() {
        let a = PrivateKey::generate().unwrap();
        let b = PrivateKey::generate().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_private_hex_round_trip() {
        let key = PrivateKey::generate().unwrap();
        let material = key.to_hex();
        assert_eq!(material.as_str().len(), PRIVATE_KEY_LEN * 2);

        let decoded = PrivateKey::from_hex(material.as_str()).unwrap();
        assert_eq!(decoded, key);
        assert_eq!(decoded.public_key(), key.public_key());
    }

    #[test]
    fn test_public_hex_is_uncompressed_point() {
        let public = PrivateKey::generate().unwrap().public_key();
        let material = public.to_hex();
        assert_eq!(material.len(), PUBLIC_KEY_LEN * 2);
        assert!(material.starts_with("04"));
        assert_eq!(PublicKey::from_hex(&material).unwrap(), public);
    }

    #[test]
    fn test_jwk_coordinates_are_32_bytes_each() {
        let public = PrivateKey::generate().unwrap().public_key();
        let (x, y) = public.jwk_coordinates();
        assert_eq!(URL_SAFE_NO_PAD.decode(x).unwrap().len(), 32);
        assert_eq!(URL_SAFE_NO_PAD.decode(y).unwrap().len(), 32);
    }

    #[rstest]
    #[case::not_hex("zz")]
    #[case::too_short("0102")]
    #[case::zero_scalar(&"00".repeat(32))]
    #[case::above_order(&"ff".repeat(32))]
    #[case::too_long(&"01".repeat(33))]
    fn test_private_from_hex_rejects(#[case] material: &str) {
        assert!(matches!(PrivateKey::from_hex(material), Err(KeyStoreError::DecodeFailure { .. })));
    }

    #[rstest]
    #[case::not_hex("xyz")]
    #[case::compressed_length(&"02".repeat(33))]
    #[case::off_curve(&format!("04{}", "01".repeat(64)))]
    fn test_public_from_hex_rejects(#[case] material: &str) {
        assert!(matches!(PublicKey::from_hex(material), Err(KeyStoreError::DecodeFailure { .. })));
    }

    #[test]
    fn test_pkcs8_der_encodes() {
        let key = PrivateKey::generate().unwrap();
        let der = key.to_pkcs8_der().unwrap();
        // SEQUENCE tag
        assert_eq!(der[0], 0x30);
    }

    #[test]
    fn test_into_entries_pairs_material() {
        let (private, public) = KeyPair::generate().unwrap().into_entries("0003");

        assert_eq!(private.kid, "0003");
        assert_eq!(public.kid, "0003");
        let decoded = PrivateKey::from_hex(private.material.as_str()).unwrap();
        assert_eq!(decoded.public_key().to_hex(), public.material.as_str());
        assert_eq!(PublicKey::from_hex(public.material.as_str()).unwrap(), decoded.public_key());
    }

    #[test]
    fn test_private_debug_does_not_leak_scalar() {
        let key = PrivateKey::generate().unwrap();
        let debug = format!("{key:?}");
        assert!(!debug.contains(key.to_hex().as_str()));
    }
}
