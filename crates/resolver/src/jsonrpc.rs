//! [`IdentityResolver`] backed by an Ethereum JSON-RPC node.
//!
//! Issues one `eth_getTransactionByHash` call per resolution. The node's
//! answer is not taken on trust: the signer is recovered locally from the
//! returned signed transaction, the transaction is re-hashed against the
//! requested hash, and a node-reported `from` must agree with the recovered
//! signer.
//!
//! ```text
//! resolve(tx) ──► POST {"method":"eth_getTransactionByHash","params":[tx]}
//!                  │
//!                  ├─ transport error / non-2xx    ─► NetworkFailure
//!                  ├─ {"error":{...}}              ─► Rpc
//!                  ├─ {"result":null}              ─► TransactionNotFound
//!                  ├─ chainId ≠ configured          ─► ChainMismatch
//!                  ├─ signature does not recover    ─► SignatureRecoveryFailure
//!                  ├─ re-hash ≠ tx / from ≠ signer  ─► SignatureRecoveryFailure
//!                  └─ recovered signer              ─► Address (EIP-55)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    config::ResolverConfig,
    error::{ResolveError, Result},
    recovery::RpcTransaction,
    resolver::IdentityResolver,
    types::{Address, TxHash},
};

const GET_TRANSACTION_BY_HASH: &str = "eth_getTransactionByHash";

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<RpcTransaction>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Resolves transaction senders through a JSON-RPC node.
#[derive(Debug)]
pub struct JsonRpcResolver {
    client: reqwest::Client,
    config: ResolverConfig,
    next_id: AtomicU64,
}

impl JsonRpcResolver {
    /// Creates a resolver for the configured node.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Config`] if the configuration is invalid or
    /// the HTTP client cannot be built.
    pub fn new(config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ResolveError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config, next_id: AtomicU64::new(1) })
    }

    async fn call(&self, hash: &str) -> Result<RpcResponse> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: GET_TRANSACTION_BY_HASH,
            params: [hash],
        };

        let response = self
            .client
            .post(self.config.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("request to node timed out after {:?}", self.config.timeout())
                } else {
                    "failed to reach node".to_owned()
                };
                ResolveError::network_with_source(message, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::network(format!("node responded with HTTP {status}")));
        }

        response
            .json::<RpcResponse>()
            .await
            .map_err(|e| ResolveError::network_with_source("node returned an invalid response", e))
    }

    fn sender_of(&self, hash: &TxHash, tx: RpcTransaction) -> Result<Address> {
        if let Some(reported) = tx.hash.as_deref()
            && reported.parse::<TxHash>().ok().as_ref() != Some(hash)
        {
            return Err(ResolveError::network(format!(
                "node returned transaction {reported} for {hash}"
            )));
        }

        if let Some(expected) = self.config.chain_id()
            && let Some(actual) = tx.chain()?
            && actual != expected
        {
            return Err(ResolveError::ChainMismatch { expected, actual });
        }

        let signer = tx.recover_signer()?;
        let rehashed = tx.transaction_hash()?;
        if rehashed != *hash {
            return Err(ResolveError::recovery(format!(
                "signed transaction hashes to {rehashed}, not {hash}"
            )));
        }

        if let Some(reported) = tx.from.as_deref() {
            let reported: Address = reported.parse()?;
            if reported != signer {
                return Err(ResolveError::recovery(format!(
                    "node reports sender {reported} but the signature recovers {signer}"
                )));
            }
        }
        Ok(signer)
    }
}

#[async_trait]
impl IdentityResolver for JsonRpcResolver {
    #[tracing::instrument(skip(self), fields(endpoint = %self.config.endpoint()))]
    async fn resolve(&self, tx_ref: &str) -> Result<Address> {
        let hash: TxHash = tx_ref.parse()?;
        let canonical = hash.to_string();

        let outcome = match self.call(&canonical).await {
            Ok(RpcResponse { error: Some(error), .. }) => {
                Err(ResolveError::Rpc { code: error.code, message: error.message })
            },
            Ok(RpcResponse { result: Some(tx), .. }) => self.sender_of(&hash, tx),
            Ok(RpcResponse { result: None, .. }) => Err(ResolveError::not_found(canonical.clone())),
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(sender) => tracing::debug!(tx_hash = %canonical, sender = %sender, "Resolved sender"),
            Err(e) => tracing::warn!(tx_hash = %canonical, error = %e, "Failed to resolve sender"),
        }
        outcome
    }
}
