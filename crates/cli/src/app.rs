//! Command-line surface and command dispatch.
//!
//! [`Cli`] is the parsed argument set; [`App`] runs one [`Command`] against
//! the configured key directory and node, returning the text to print.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chainauth_authn::{Authenticator, TokenIssuer, jwt::verify_token};
use chainauth_keystore::{FileKeyStore, KeyStore};
use chainauth_resolver::JsonRpcResolver;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::config::ServiceConfig;

/// Arguments of the `chainauth` binary.
///
/// Global flags fall back to `CHAINAUTH_*` environment variables and take
/// precedence over the config file.
#[derive(Debug, Parser)]
#[command(name = "chainauth", version, about = "Key store bootstrap and on-chain token issuer")]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CHAINAUTH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Key store directory (overrides the config file)
    #[arg(long, env = "CHAINAUTH_KEY_DIR", global = true)]
    pub key_dir: Option<PathBuf>,

    /// JSON-RPC endpoint (overrides the config file)
    #[arg(long, env = "CHAINAUTH_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Operation to run.
    #[command(subcommand)]
    pub command: Command,
}

/// A single `chainauth` operation.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create the first signing key if the store is empty
    Init,
    /// Append a new signing key
    Rotate,
    /// Resolve a transaction's sender and issue a token for it
    Issue {
        /// Transaction hash
        #[arg(long)]
        tx: String,
        /// Signing key id (default: the newest key)
        #[arg(long)]
        kid: Option<String>,
    },
    /// Verify a token and print its claims
    Verify {
        /// Compact JWS
        #[arg(long)]
        token: String,
    },
    /// Print the public key set
    Keys,
}

/// A configured service instance.
///
/// Owns a [`FileKeyStore`] over the configured key directory; the JSON-RPC
/// resolver is built per `issue` so the other commands never need a node.
pub struct App {
    config: ServiceConfig,
    store: Arc<FileKeyStore>,
}

impl App {
    /// Creates an instance over `config`. Touches neither the key
    /// directory nor the network.
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        let store = Arc::new(FileKeyStore::new(config.keys.dir.clone()));
        Self { config, store }
    }

    /// Runs one command and returns what it prints.
    ///
    /// - `init`, `rotate`: the newest key id
    /// - `issue`: the token descriptor as JSON
    /// - `verify`: the verified claims as JSON
    /// - `keys`: the public key set
    ///
    /// # Errors
    ///
    /// Returns the failing step's error with context. `issue` without
    /// `--kid` fails on an empty store.
    pub async fn run(&self, command: Command, cancel: &CancellationToken) -> Result<String> {
        match command {
            Command::Init => {
                let max_id = self.store.initialize().await.context("initializing key store")?;
                Ok(max_id)
            },
            Command::Rotate => {
                let max_id = self.store.rotate().await.context("rotating key store")?;
                Ok(max_id)
            },
            Command::Issue { tx, kid } => {
                let kid = match kid {
                    Some(kid) => kid,
                    None => self.newest_kid().await?,
                };
                let resolver = JsonRpcResolver::new(self.config.resolver.clone())?;
                let authenticator = Authenticator::builder()
                    .resolver(Arc::new(resolver))
                    .issuer(TokenIssuer::new(self.store.clone()))
                    .resolve_timeout(self.config.resolve_timeout)
                    .build();
                let token =
                    authenticator.authenticate(&tx, &kid, &self.config.claims, cancel).await?;
                Ok(serde_json::to_string(&token)?)
            },
            Command::Verify { token } => {
                let claims = verify_token(&token, self.store.as_ref()).await?;
                Ok(serde_json::to_string(&claims)?)
            },
            Command::Keys => {
                let keys = self.store.public_key_set().await?;
                Ok(serde_json::to_string_pretty(&keys)?)
            },
        }
    }

    async fn newest_kid(&self) -> Result<String> {
        let keys = self.store.public_key_set().await?;
        anyhow::ensure!(!keys.is_empty(), "key store is empty; run `chainauth init` first");
        Ok(keys.max_id)
    }
}
