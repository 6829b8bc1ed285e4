//! Local sender recovery for node-reported transactions.
//!
//! The signing payload is rebuilt from the fields the node returns, the
//! signer's public key is recovered from `v`/`r`/`s` over secp256k1, and the
//! address is the last 20 bytes of the Keccak-256 hash of that key. The
//! signed transaction is re-hashed as well, so a node cannot answer with a
//! different transaction than the one requested.
//!
//! | `type`        | Signing payload                                                    |
//! |---------------|--------------------------------------------------------------------|
//! | absent, `0x0` | `rlp([nonce, gasPrice, gas, to, value, input])`, plus `[chainId, 0, 0]` when `v >= 35` |
//! | `0x1`         | `0x01 ‖ rlp([chainId, nonce, gasPrice, gas, to, value, input, accessList])` |
//! | `0x2`         | `0x02 ‖ rlp([chainId, nonce, maxPriorityFeePerGas, maxFeePerGas, gas, to, value, input, accessList])` |
//!
//! Any other envelope is a [`ResolveError::SignatureRecoveryFailure`].

use k256::{
    ecdsa::{RecoveryId, Signature, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::{
    error::{ResolveError, Result},
    types::{ADDRESS_LEN, Address, TX_HASH_LEN, TxHash},
};

use self::rlp::Item;

const ACCESS_LIST_TX_TYPE: u8 = 0x01;
const DYNAMIC_FEE_TX_TYPE: u8 = 0x02;

/// Largest integer field the transaction formats carry.
const MAX_QUANTITY_LEN: usize = 32;

/// Parses a `0x`-prefixed hex quantity that fits in a `u64`.
pub(crate) fn parse_quantity(value: &str) -> Option<u64> {
    let digits = value.strip_prefix("0x")?;
    u64::from_str_radix(digits, 16).ok()
}

/// One entry of an EIP-2930 access list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccessListItem {
    pub(crate) address: String,
    #[serde(default)]
    pub(crate) storage_keys: Vec<String>,
}

/// Transaction object returned by `eth_getTransactionByHash`.
///
/// Every field is optional on the wire; the ones a given envelope needs are
/// checked when the signer is recovered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RpcTransaction {
    pub(crate) hash: Option<String>,
    pub(crate) from: Option<String>,
    #[serde(rename = "type")]
    pub(crate) tx_type: Option<String>,
    pub(crate) chain_id: Option<String>,
    pub(crate) nonce: Option<String>,
    pub(crate) gas_price: Option<String>,
    pub(crate) max_priority_fee_per_gas: Option<String>,
    pub(crate) max_fee_per_gas: Option<String>,
    pub(crate) gas: Option<String>,
    pub(crate) to: Option<String>,
    pub(crate) value: Option<String>,
    pub(crate) input: Option<String>,
    pub(crate) access_list: Option<Vec<AccessListItem>>,
    pub(crate) v: Option<String>,
    pub(crate) r: Option<String>,
    pub(crate) s: Option<String>,
    pub(crate) y_parity: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Envelope {
    /// Pre-typed transaction; `chain_id` is set when replay-protected.
    Legacy { chain_id: Option<u64> },
    AccessList,
    DynamicFee,
}

impl Envelope {
    fn type_byte(self) -> Option<u8> {
        match self {
            Self::Legacy { .. } => None,
            Self::AccessList => Some(ACCESS_LIST_TX_TYPE),
            Self::DynamicFee => Some(DYNAMIC_FEE_TX_TYPE),
        }
    }
}

fn missing(field: &str) -> ResolveError {
    ResolveError::recovery(format!("transaction has no {field}"))
}

fn malformed(field: &str, raw: &str) -> ResolveError {
    ResolveError::recovery(format!("malformed {field} '{raw}'"))
}

fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str> {
    value.ok_or_else(|| missing(field))
}

fn u64_field(field: &str, value: Option<&str>) -> Result<u64> {
    let raw = required(field, value)?;
    parse_quantity(raw).ok_or_else(|| malformed(field, raw))
}

/// Minimal big-endian bytes of a hex quantity; zero is empty.
fn quantity(field: &str, value: Option<&str>) -> Result<Vec<u8>> {
    let raw = required(field, value)?;
    let digits = raw.strip_prefix("0x").ok_or_else(|| malformed(field, raw))?;
    let trimmed = digits.trim_start_matches('0');
    let even = if trimmed.len() % 2 == 1 { format!("0{trimmed}") } else { trimmed.to_owned() };
    let bytes = hex::decode(even).map_err(|_| malformed(field, raw))?;
    if bytes.len() > MAX_QUANTITY_LEN {
        return Err(malformed(field, raw));
    }
    Ok(bytes)
}

fn data(field: &str, raw: &str) -> Result<Vec<u8>> {
    let digits = raw.strip_prefix("0x").ok_or_else(|| malformed(field, raw))?;
    hex::decode(digits).map_err(|_| malformed(field, raw))
}

fn fixed_data(field: &str, raw: &str, len: usize) -> Result<Vec<u8>> {
    let bytes = data(field, raw)?;
    if bytes.len() != len {
        return Err(malformed(field, raw));
    }
    Ok(bytes)
}

fn left_pad(bytes: &[u8]) -> [u8; MAX_QUANTITY_LEN] {
    let mut out = [0u8; MAX_QUANTITY_LEN];
    out[MAX_QUANTITY_LEN - bytes.len()..].copy_from_slice(bytes);
    out
}

/// Address of the account controlled by `key`.
pub(crate) fn address_of(key: &VerifyingKey) -> Address {
    let point = k256::PublicKey::from(key).to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    let mut bytes = [0u8; ADDRESS_LEN];
    bytes.copy_from_slice(&digest[TX_HASH_LEN - ADDRESS_LEN..]);
    Address::new(bytes)
}

impl RpcTransaction {
    fn envelope(&self) -> Result<Envelope> {
        match self.tx_type.as_deref() {
            None | Some("0x0") => {
                let v = u64_field("v", self.v.as_deref())?;
                let chain_id = match v {
                    27 | 28 => None,
                    v if v >= 35 => Some((v - 35) / 2),
                    _ => return Err(ResolveError::recovery(format!("invalid legacy v value {v}"))),
                };
                Ok(Envelope::Legacy { chain_id })
            },
            Some("0x1") => Ok(Envelope::AccessList),
            Some("0x2") => Ok(Envelope::DynamicFee),
            Some(other) => {
                Err(ResolveError::recovery(format!("unsupported transaction type {other}")))
            },
        }
    }

    /// Chain id the transaction is bound to, if any.
    ///
    /// Uses the `chainId` field when present, otherwise derives it from a
    /// replay-protected legacy `v`. Needs no signature to be valid.
    pub(crate) fn chain(&self) -> Result<Option<u64>> {
        if let Some(raw) = self.chain_id.as_deref() {
            return parse_quantity(raw).map(Some).ok_or_else(|| malformed("chainId", raw));
        }
        match self.tx_type.as_deref() {
            None | Some("0x0") => match self.v.as_deref().and_then(parse_quantity) {
                Some(v) if v >= 35 => Ok(Some((v - 35) / 2)),
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn recipient(&self) -> Result<Item> {
        match self.to.as_deref() {
            // Contract creation.
            None => Ok(Item::bytes(Vec::new())),
            Some(raw) => Ok(Item::bytes(fixed_data("to", raw, ADDRESS_LEN)?)),
        }
    }

    fn access_list(&self) -> Result<Item> {
        let entries = self.access_list.as_deref().unwrap_or_default();
        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            let keys = entry
                .storage_keys
                .iter()
                .map(|key| fixed_data("storage key", key, TX_HASH_LEN).map(Item::bytes))
                .collect::<Result<Vec<_>>>()?;
            items.push(Item::List(vec![
                Item::bytes(fixed_data("access list address", &entry.address, ADDRESS_LEN)?),
                Item::List(keys),
            ]));
        }
        Ok(Item::List(items))
    }

    /// Fields common to the signing payload and the signed encoding.
    fn unsigned_fields(&self, envelope: Envelope) -> Result<Vec<Item>> {
        let q = |field: &str, value: &Option<String>| quantity(field, value.as_deref()).map(Item::bytes);
        let input = Item::bytes(data("input", required("input", self.input.as_deref())?)?);

        Ok(match envelope {
            Envelope::Legacy { .. } => vec![
                q("nonce", &self.nonce)?,
                q("gasPrice", &self.gas_price)?,
                q("gas", &self.gas)?,
                self.recipient()?,
                q("value", &self.value)?,
                input,
            ],
            Envelope::AccessList => vec![
                q("chainId", &self.chain_id)?,
                q("nonce", &self.nonce)?,
                q("gasPrice", &self.gas_price)?,
                q("gas", &self.gas)?,
                self.recipient()?,
                q("value", &self.value)?,
                input,
                self.access_list()?,
            ],
            Envelope::DynamicFee => vec![
                q("chainId", &self.chain_id)?,
                q("nonce", &self.nonce)?,
                q("maxPriorityFeePerGas", &self.max_priority_fee_per_gas)?,
                q("maxFeePerGas", &self.max_fee_per_gas)?,
                q("gas", &self.gas)?,
                self.recipient()?,
                q("value", &self.value)?,
                input,
                self.access_list()?,
            ],
        })
    }

    fn digest(envelope: Envelope, fields: Vec<Item>) -> [u8; TX_HASH_LEN] {
        let mut hasher = Keccak256::new();
        if let Some(type_byte) = envelope.type_byte() {
            hasher.update([type_byte]);
        }
        hasher.update(rlp::encode(&Item::List(fields)));
        hasher.finalize().into()
    }

    /// Hash the sender signed.
    pub(crate) fn signing_hash(&self) -> Result<[u8; TX_HASH_LEN]> {
        let envelope = self.envelope()?;
        let mut fields = self.unsigned_fields(envelope)?;
        if let Envelope::Legacy { chain_id: Some(chain_id) } = envelope {
            fields.extend([Item::uint(chain_id), Item::uint(0), Item::uint(0)]);
        }
        Ok(Self::digest(envelope, fields))
    }

    /// Hash of the signed transaction, which is its on-chain identifier.
    pub(crate) fn transaction_hash(&self) -> Result<TxHash> {
        let envelope = self.envelope()?;
        let mut fields = self.unsigned_fields(envelope)?;
        let v = match envelope {
            Envelope::Legacy { .. } => Item::bytes(quantity("v", self.v.as_deref())?),
            Envelope::AccessList | Envelope::DynamicFee => {
                Item::uint(u64::from(self.parity(envelope)?))
            },
        };
        fields.extend([
            v,
            Item::bytes(quantity("r", self.r.as_deref())?),
            Item::bytes(quantity("s", self.s.as_deref())?),
        ]);
        Ok(TxHash::new(Self::digest(envelope, fields)))
    }

    /// Parity of the signature's `y` coordinate.
    fn parity(&self, envelope: Envelope) -> Result<u8> {
        let parity = match envelope {
            Envelope::Legacy { chain_id: None } => u64_field("v", self.v.as_deref())? - 27,
            Envelope::Legacy { chain_id: Some(_) } => (u64_field("v", self.v.as_deref())? - 35) % 2,
            Envelope::AccessList | Envelope::DynamicFee => {
                let raw = self.y_parity.as_deref().or(self.v.as_deref());
                u64_field("yParity", raw)?
            },
        };
        match parity {
            0 => Ok(0),
            1 => Ok(1),
            other => Err(ResolveError::recovery(format!("invalid signature parity {other}"))),
        }
    }

    /// Recovers the address whose key produced the transaction signature.
    pub(crate) fn recover_signer(&self) -> Result<Address> {
        let envelope = self.envelope()?;
        if let Envelope::Legacy { chain_id: Some(derived) } = envelope
            && let Some(Some(reported)) = self.chain_id.as_deref().map(parse_quantity)
            && reported != derived
        {
            return Err(ResolveError::recovery(format!(
                "chainId {reported} disagrees with chain {derived} encoded in v"
            )));
        }

        let prehash = self.signing_hash()?;
        let r = quantity("r", self.r.as_deref())?;
        let s = quantity("s", self.s.as_deref())?;
        let mut compact = [0u8; 2 * MAX_QUANTITY_LEN];
        compact[..MAX_QUANTITY_LEN].copy_from_slice(&left_pad(&r));
        compact[MAX_QUANTITY_LEN..].copy_from_slice(&left_pad(&s));

        let signature = Signature::from_slice(&compact)
            .map_err(|e| ResolveError::recovery(format!("malformed signature: {e}")))?;
        let recovery_id = RecoveryId::from_byte(self.parity(envelope)?)
            .ok_or_else(|| ResolveError::recovery("invalid recovery id"))?;
        let key = VerifyingKey::recover_from_prehash(&prehash, &signature, recovery_id)
            .map_err(|e| ResolveError::recovery(format!("signature does not recover a key: {e}")))?;
        Ok(address_of(&key))
    }
}

/// Recursive-length-prefix encoding, limited to what transaction payloads
/// use: byte strings and nested lists.
mod rlp {
    const SHORT_LIMIT: usize = 55;
    const STRING_OFFSET: u8 = 0x80;
    const LIST_OFFSET: u8 = 0xc0;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(super) enum Item {
        Bytes(Vec<u8>),
        List(Vec<Item>),
    }

    impl Item {
        pub(super) fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
            Self::Bytes(bytes.into())
        }

        /// Big-endian with leading zeros stripped; zero is the empty string.
        pub(super) fn uint(n: u64) -> Self {
            let be = n.to_be_bytes();
            let skip = be.iter().take_while(|b| **b == 0).count();
            Self::Bytes(be[skip..].to_vec())
        }
    }

    pub(super) fn encode(item: &Item) -> Vec<u8> {
        let mut out = Vec::new();
        encode_into(item, &mut out);
        out
    }

    fn encode_into(item: &Item, out: &mut Vec<u8>) {
        match item {
            Item::Bytes(bytes) => match bytes.as_slice() {
                [single] if *single < STRING_OFFSET => out.push(*single),
                _ => {
                    header(STRING_OFFSET, bytes.len(), out);
                    out.extend_from_slice(bytes);
                },
            },
            Item::List(items) => {
                let mut payload = Vec::new();
                for item in items {
                    encode_into(item, &mut payload);
                }
                header(LIST_OFFSET, payload.len(), out);
                out.extend(payload);
            },
        }
    }

    fn header(offset: u8, len: usize, out: &mut Vec<u8>) {
        if len <= SHORT_LIMIT {
            out.push(offset + len as u8);
            return;
        }
        let be = len.to_be_bytes();
        let skip = be.iter().take_while(|b| **b == 0).count();
        let len_bytes = &be[skip..];
        out.push(offset + SHORT_LIMIT as u8 + len_bytes.len() as u8);
        out.extend_from_slice(len_bytes);
    }

}
