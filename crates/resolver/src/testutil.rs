//! Test doubles for the resolver boundary.
//!
//! Feature-gated behind `testutil`:
//!
//! ```toml
//! [dev-dependencies]
//! chainauth-resolver = { path = "../resolver", features = ["testutil"] }
//! ```

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use parking_lot::Mutex;

use crate::{
    error::{ResolveError, Result},
    recovery::{RpcTransaction, address_of},
    resolver::IdentityResolver,
    types::{Address, TxHash},
};

/// Canned outcome for one transaction hash.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Resolve to this sender.
    Sender(Address),
    /// Fail with [`ResolveError::TransactionNotFound`].
    NotFound,
    /// Fail with [`ResolveError::NetworkFailure`].
    Unreachable,
    /// Fail with [`ResolveError::SignatureRecoveryFailure`].
    Unrecoverable,
}

/// An [`IdentityResolver`] answering from a fixed table.
///
/// Unknown hashes resolve to [`Outcome::NotFound`]. An optional delay
/// simulates a slow node.
#[derive(Debug, Default)]
pub struct StaticResolver {
    outcomes: Mutex<HashMap<TxHash, Outcome>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticResolver {
    /// Creates a resolver with no known transactions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `outcome` for `tx_hash`.
    ///
    /// # Panics
    ///
    /// Panics if `tx_hash` is not a valid transaction hash.
    #[must_use]
    pub fn with(self, tx_hash: &str, outcome: Outcome) -> Self {
        let hash: TxHash = tx_hash.parse().expect("valid tx hash");
        self.outcomes.lock().insert(hash, outcome);
        self
    }

    /// Delays every resolution by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `resolve` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityResolver for StaticResolver {
    async fn resolve(&self, tx_ref: &str) -> Result<Address> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let hash: TxHash = tx_ref.parse()?;
        let outcome = self.outcomes.lock().get(&hash).cloned().unwrap_or(Outcome::NotFound);
        match outcome {
            Outcome::Sender(address) => Ok(address),
            Outcome::NotFound => Err(ResolveError::not_found(hash.to_string())),
            Outcome::Unreachable => Err(ResolveError::network("node unreachable")),
            Outcome::Unrecoverable => Err(ResolveError::recovery("malformed signature")),
        }
    }
}

/// Builds a deterministic transaction hash from a small index.
#[must_use]
pub fn tx_hash(index: u8) -> String {
    format!("0x{}", hex::encode([index; 32]))
}

/// Builds a deterministic address from a small index.
#[must_use]
pub fn address(index: u8) -> Address {
    Address::new([index; 20])
}

/// A signed transaction as a node reports it from `eth_getTransactionByHash`.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    /// Transaction hash, lowercase `0x`-hex.
    pub hash: String,
    /// Address of the signing key.
    pub sender: Address,
    /// The JSON-RPC `result` object, including `hash` and a lowercase `from`.
    pub result: serde_json::Value,
}

/// Signs an EIP-1559 transfer with the secp256k1 key `[key_seed; 32]`.
///
/// Distinct seeds give distinct senders; distinct nonces give distinct
/// hashes for the same sender.
///
/// # Panics
///
/// Panics if `key_seed` is zero, which is not a valid secret key.
#[must_use]
pub fn signed_transaction(key_seed: u8, chain_id: u64, nonce: u64) -> SignedTransaction {
    let key = SigningKey::from_slice(&[key_seed; 32]).expect("valid secret key");
    let mut tx = RpcTransaction {
        tx_type: Some("0x2".into()),
        chain_id: Some(format!("{chain_id:#x}")),
        nonce: Some(format!("{nonce:#x}")),
        max_priority_fee_per_gas: Some("0x3b9aca00".into()),
        max_fee_per_gas: Some("0x4a817c800".into()),
        gas: Some("0x5208".into()),
        to: Some(format!("0x{}", "35".repeat(20))),
        value: Some("0xde0b6b3a7640000".into()),
        input: Some("0x".into()),
        access_list: Some(Vec::new()),
        ..RpcTransaction::default()
    };

    let prehash = tx.signing_hash().expect("complete unsigned transaction");
    let (signature, recovery_id) =
        key.sign_prehash_recoverable(&prehash).expect("signing succeeds");
    let compact = signature.to_bytes();
    let parity = format!("{:#x}", recovery_id.to_byte());
    tx.r = Some(format!("0x{}", hex::encode(&compact[..32])));
    tx.s = Some(format!("0x{}", hex::encode(&compact[32..])));
    tx.v = Some(parity.clone());
    tx.y_parity = Some(parity);

    let sender = address_of(key.verifying_key());
    let hash = tx.transaction_hash().expect("complete signed transaction").to_string();
    tx.hash = Some(hash.clone());
    tx.from = Some(sender.to_checksum().to_lowercase());

    SignedTransaction {
        hash,
        sender,
        result: serde_json::to_value(&tx).expect("transaction serializes"),
    }
}
