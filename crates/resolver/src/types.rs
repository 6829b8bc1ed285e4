//! Address and transaction hash types.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

use crate::error::ResolveError;

/// Length of an account address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Length of a transaction hash in bytes.
pub const TX_HASH_LEN: usize = 32;

fn strip_hex_prefix(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}

fn decode_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    let digits = strip_hex_prefix(s)?;
    let mut out = [0u8; N];
    hex::decode_to_slice(digits, &mut out).ok()?;
    Some(out)
}

/// A 20-byte account address.
///
/// `Display` and serialization use the EIP-55 mixed-case checksum form,
/// which is the exact string bound into issued tokens.
///
/// ```
/// use chainauth_resolver::Address;
///
/// let addr: Address = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap();
/// assert_eq!(addr.to_string(), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Wraps raw address bytes.
    #[must_use]
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// EIP-55 checksum encoding, `0x`-prefixed.
    #[must_use]
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = Keccak256::digest(lower.as_bytes());

        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Parses an address, rejecting mixed-case input whose checksum is wrong.
    ///
    /// All-lowercase and all-uppercase input carries no checksum and is
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::SignatureRecoveryFailure`] if the input is
    /// not a 20-byte hex address or fails the checksum.
    pub fn parse_checksummed(s: &str) -> Result<Self, ResolveError> {
        let addr: Self = s.parse()?;
        let digits = strip_hex_prefix(s).unwrap_or(s);
        let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && addr.to_checksum() != s {
            return Err(ResolveError::recovery(format!("address '{s}' fails EIP-55 checksum")));
        }
        Ok(addr)
    }
}

impl FromStr for Address {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<ADDRESS_LEN>(s)
            .map(Self)
            .ok_or_else(|| ResolveError::recovery(format!("'{s}' is not a 20-byte hex address")))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A validated 32-byte transaction hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash([u8; TX_HASH_LEN]);

impl TxHash {
    /// Wraps raw hash bytes.
    #[must_use]
    pub const fn new(bytes: [u8; TX_HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl FromStr for TxHash {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<TX_HASH_LEN>(s)
            .map(Self)
            .ok_or_else(|| ResolveError::InvalidTransactionHash { hash: s.to_owned() })
    }
}

/// Lowercase, `0x`-prefixed.
impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({self})")
    }
}
