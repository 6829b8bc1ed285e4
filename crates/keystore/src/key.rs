//! Persisted key records and key identifiers.
//!
//! Both the private and the public store serialize a [`KeySet`]:
//!
//! ```json
//! {
//!   "keys": [
//!     { "kty": "EC", "hex": "<material>", "alg": "ES256", "kid": "0001" }
//!   ],
//!   "maxid": "0001"
//! }
//! ```
//!
//! Key identifiers are zero-padded decimal strings. They are assigned in
//! order by rotation and never reused.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::IgnoredAny};
use zeroize::Zeroizing;

use crate::error::{KeyStoreError, Result};

/// Identifier assigned to the first key of a fresh store.
pub const FIRST_KEY_ID: &str = "0001";

/// Minimum number of digits in a key identifier.
pub const KEY_ID_WIDTH: usize = 4;

/// Formats a numeric key identifier, zero-padded to [`KEY_ID_WIDTH`] digits.
///
/// Identifiers that need more digits are not truncated.
///
/// ```
/// use chainauth_keystore::key::format_key_id;
///
/// assert_eq!(format_key_id(7), "0007");
/// assert_eq!(format_key_id(12345), "12345");
/// ```
#[must_use]
pub fn format_key_id(n: u64) -> String {
    format!("{n:0width$}", width = KEY_ID_WIDTH)
}

/// Parses a stored key identifier as a non-negative integer.
///
/// # Errors
///
/// Returns [`KeyStoreError::MalformedState`] if `id` is empty, contains
/// anything other than ASCII digits, or overflows `u64`.
pub fn parse_key_id(id: &str) -> Result<u64> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(KeyStoreError::malformed(format!(
            "key id '{id}' is not a non-negative integer"
        )));
    }
    id.parse::<u64>()
        .map_err(|_| KeyStoreError::malformed(format!("key id '{id}' is out of range")))
}

/// Returns the identifier that follows `max_id`.
///
/// # Errors
///
/// Returns [`KeyStoreError::MalformedState`] if `max_id` does not parse or
/// the next identifier would overflow.
pub fn next_key_id(max_id: &str) -> Result<String> {
    let current = parse_key_id(max_id)?;
    let next = current
        .checked_add(1)
        .ok_or_else(|| KeyStoreError::malformed(format!("key id '{max_id}' cannot be incremented")))?;
    Ok(format_key_id(next))
}

/// Key type of a stored entry. Only elliptic-curve keys are produced.
///
/// Any stored `kty` value, including `null`, reads back as [`KeyType::Ec`];
/// the field carries no information the store acts on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum KeyType {
    /// Elliptic curve key.
    #[default]
    #[serde(rename = "EC")]
    Ec,
}

impl<'de> Deserialize<'de> for KeyType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(Self::Ec)
    }
}

/// Signing algorithm recorded for a stored entry.
///
/// An empty `alg` field marks a placeholder entry that must never be used
/// for signing. A missing or `null` field, or any algorithm name other than
/// `ES256`, reads back as [`KeyAlgorithm::Unset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum KeyAlgorithm {
    /// ECDSA over P-256 with SHA-256.
    #[serde(rename = "ES256")]
    Es256,
    /// No algorithm recorded.
    #[default]
    #[serde(rename = "")]
    Unset,
}

impl KeyAlgorithm {
    /// Returns the JOSE name of the algorithm (empty when unset).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Es256 => "ES256",
            Self::Unset => "",
        }
    }
}

impl<'de> Deserialize<'de> for KeyAlgorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<String>::deserialize(deserializer)?.as_deref() {
            Some("ES256") => Self::Es256,
            _ => Self::Unset,
        })
    }
}

/// Hex-encoded key material.
///
/// The buffer is zeroed on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial(Zeroizing<String>);

impl KeyMaterial {
    /// Wraps hex-encoded material.
    #[must_use]
    pub fn new(hex: impl Into<String>) -> Self {
        Self(Zeroizing::new(hex.into()))
    }

    /// Returns the hex encoding.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for KeyMaterial {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

impl Serialize for KeyMaterial {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for KeyMaterial {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| Self(Zeroizing::new(s)))
    }
}

/// A single stored key entry.
///
/// Missing or `null` fields read back as their empty value, so a
/// placeholder entry never stops the rest of its set from loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    /// Key type.
    #[serde(rename = "kty", default)]
    pub key_type: KeyType,
    /// Hex-encoded private scalar or uncompressed public point.
    #[serde(rename = "hex", default, deserialize_with = "null_as_default")]
    pub material: KeyMaterial,
    /// Signing algorithm; [`KeyAlgorithm::Unset`] for placeholders.
    #[serde(rename = "alg", default)]
    pub algorithm: KeyAlgorithm,
    /// Zero-padded decimal key identifier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub kid: String,
}

impl Key {
    /// Creates an ES256 entry for the given identifier and material.
    #[must_use]
    pub fn es256(kid: impl Into<String>, material: KeyMaterial) -> Self {
        Self { key_type: KeyType::Ec, material, algorithm: KeyAlgorithm::Es256, kid: kid.into() }
    }

    /// Returns `true` if the entry may be used for signing or verification.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.algorithm != KeyAlgorithm::Unset
    }
}

/// An ordered, append-only collection of keys plus the highest assigned id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    /// Keys in the order they were appended.
    #[serde(default, deserialize_with = "null_as_default")]
    pub keys: Vec<Key>,
    /// Identifier of the most recently appended key.
    #[serde(rename = "maxid", default, deserialize_with = "null_as_default")]
    pub max_id: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl KeySet {
    /// Returns `true` if the set holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of keys in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns the first entry whose id matches `kid`.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Key> {
        self.keys.iter().find(|key| key.kid == kid)
    }

    /// Returns the entry under `kid` if it exists and is usable.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::KeyNotFound`] if no entry matches or the
    /// matching entry has no algorithm recorded.
    pub fn usable(&self, kid: &str) -> Result<&Key> {
        self.find(kid).filter(|key| key.is_usable()).ok_or_else(|| KeyStoreError::key_not_found(kid))
    }

    /// Appends `key` and advances `max_id` to its identifier.
    pub fn append(&mut self, key: Key) {
        self.max_id.clone_from(&key.kid);
        self.keys.push(key);
    }

    /// Iterates over the key identifiers in order.
    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|key| key.kid.as_str())
    }
}

/// Checks that a private and a public set describe the same key history.
///
/// Both sets must hold the same identifiers in the same order, agree on
/// `maxid`, and have `maxid` equal to the last appended identifier.
///
/// # Errors
///
/// Returns [`KeyStoreError::MalformedState`] describing the first mismatch.
pub fn check_lockstep(private: &KeySet, public: &KeySet) -> Result<()> {
    if private.max_id != public.max_id {
        return Err(KeyStoreError::malformed(format!(
            "private maxid '{}' does not match public maxid '{}'",
            private.max_id, public.max_id
        )));
    }
    if !private.kids().eq(public.kids()) {
        return Err(KeyStoreError::malformed("private and public key ids differ"));
    }
    if let Some(last) = private.keys.last()
        && last.kid != private.max_id
    {
        return Err(KeyStoreError::malformed(format!(
            "maxid '{}' does not match last key id '{}'",
            private.max_id, last.kid
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    fn entry(kid: &str) -> Key {
        Key::es256(kid, KeyMaterial::new("00"))
    }

    #[rstest]
    #[case("0000", "0001")]
    #[case("0001", "0002")]
    #[case("0009", "0010")]
    #[case("0999", "1000")]
    #[case("9999", "10000")]
    #[case("42", "0043")]
    fn test_next_key_id(#[case] max_id: &str, #[case] expected: &str) {
        assert_eq!(next_key_id(max_id).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("-1")]
    #[case("+1")]
    #[case(" 1")]
    #[case("18446744073709551616")]
    fn test_next_key_id_rejects_malformed(#[case] max_id: &str) {
        assert!(matches!(next_key_id(max_id), Err(KeyStoreError::MalformedState { .. })));
    }

    #[test]
    fn test_next_key_id_overflow() {
        let max = u64::MAX.to_string();
        assert!(matches!(next_key_id(&max), Err(KeyStoreError::MalformedState { .. })));
    }

    #[test]
    fn test_key_set_wire_format() {
        let mut set = KeySet::default();
        set.append(Key::es256("0001", KeyMaterial::new("abcd")));

        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "keys": [{ "kty": "EC", "hex": "abcd", "alg": "ES256", "kid": "0001" }],
                "maxid": "0001"
            })
        );
    }

    #[test]
    fn test_key_set_accepts_null_keys_and_empty_alg() {
        let set: KeySet = serde_json::from_str(r#"{"keys":null,"maxid":""}"#).unwrap();
        assert!(set.is_empty());

        let set: KeySet = serde_json::from_str(
            r#"{"keys":[{"kty":"EC","hex":"ab","alg":"","kid":"0001"}],"maxid":"0001"}"#,
        )
        .unwrap();
        assert_eq!(set.keys[0].algorithm, KeyAlgorithm::Unset);
        assert!(!set.keys[0].is_usable());
    }

    #[rstest]
    #[case::empty_alg(r#"{"kty":"EC","hex":"","alg":"","kid":"0002"}"#)]
    #[case::null_alg(r#"{"kty":"EC","hex":"","alg":null,"kid":"0002"}"#)]
    #[case::missing_alg(r#"{"kty":"EC","hex":"","kid":"0002"}"#)]
    #[case::unknown_alg(r#"{"kty":"EC","hex":"","alg":"ES384","kid":"0002"}"#)]
    #[case::missing_hex(r#"{"kty":"EC","alg":"","kid":"0002"}"#)]
    #[case::null_hex(r#"{"kty":"EC","hex":null,"alg":null,"kid":"0002"}"#)]
    #[case::null_kty(r#"{"kty":null,"alg":"","kid":"0002"}"#)]
    fn test_placeholder_entry_does_not_poison_set(#[case] placeholder: &str) {
        let json = format!(
            r#"{{"keys":[{{"kty":"EC","hex":"ab","alg":"ES256","kid":"0001"}},{placeholder}],"maxid":"0002"}}"#
        );
        let set: KeySet = serde_json::from_str(&json).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.usable("0001").unwrap().material.as_str(), "ab");
        assert_eq!(set.keys[1].algorithm, KeyAlgorithm::Unset);
        assert!(matches!(set.usable("0002"), Err(KeyStoreError::KeyNotFound { .. })));
    }

    #[test]
    fn test_entry_without_kid_is_never_found() {
        let set: KeySet =
            serde_json::from_str(r#"{"keys":[{"alg":"ES256","hex":"ab"}],"maxid":null}"#).unwrap();
        assert_eq!(set.keys[0].kid, "");
        assert_eq!(set.max_id, "");
        assert!(matches!(set.usable("0001"), Err(KeyStoreError::KeyNotFound { .. })));
    }

    #[test]
    fn test_usable_rejects_placeholder_and_missing() {
        let mut set = KeySet::default();
        set.append(entry("0001"));
        set.append(Key { algorithm: KeyAlgorithm::Unset, ..entry("0002") });

        assert!(set.usable("0001").is_ok());
        assert!(matches!(set.usable("0002"), Err(KeyStoreError::KeyNotFound { .. })));
        assert!(matches!(set.usable("9999"), Err(KeyStoreError::KeyNotFound { .. })));
    }

    #[test]
    fn test_material_debug_is_redacted() {
        let key = Key::es256("0001", KeyMaterial::new("deadbeef"));
        let debug = format!("{key:?}");
        assert!(!debug.contains("deadbeef"), "material leaked: {debug}");
    }

    #[test]
    fn test_check_lockstep() {
        let mut private = KeySet::default();
        let mut public = KeySet::default();
        private.append(entry("0001"));
        public.append(entry("0001"));
        assert!(check_lockstep(&private, &public).is_ok());

        private.append(entry("0002"));
        assert!(matches!(check_lockstep(&private, &public), Err(KeyStoreError::MalformedState { .. })));

        public.append(entry("0002"));
        public.max_id = "0001".into();
        private.max_id = "0001".into();
        assert!(matches!(check_lockstep(&private, &public), Err(KeyStoreError::MalformedState { .. })));
    }

    proptest! {
        #[test]
        fn prop_next_key_id_is_successor(n in 0u64..1_000_000) {
            let next = next_key_id(&format_key_id(n)).unwrap();
            prop_assert!(next.len() >= KEY_ID_WIDTH);
            prop_assert_eq!(parse_key_id(&next).unwrap(), n + 1);
        }

        #[test]
        fn prop_formatted_ids_sort_like_numbers(a in 0u64..10_000, b in 0u64..10_000) {
            prop_assert_eq!(format_key_id(a).cmp(&format_key_id(b)), a.cmp(&b));
        }
    }
}
