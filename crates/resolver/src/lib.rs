//! # chainauth resolver
//!
//! Converts a transaction hash into the checksummed address of the account
//! that signed it. Controlling an address is proven by having sent a
//! transaction from it. The signer is recovered locally from the
//! transaction signature the node returns.
//!
//! The [`IdentityResolver`] trait is the boundary consumed by token
//! issuance. [`JsonRpcResolver`] implements it against any Ethereum
//! JSON-RPC endpoint.
//!
//! ```no_run
//! use chainauth_resolver::{IdentityResolver, JsonRpcResolver, ResolverConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ResolverConfig::builder().endpoint("https://rpc.example.org").chain_id(1).build()?;
//! let resolver = JsonRpcResolver::new(config)?;
//! let sender = resolver
//!     .resolve("0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b")
//!     .await?;
//! println!("authenticated {sender}");
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables [`testutil::StaticResolver`], a table-driven
//!   resolver for tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod jsonrpc;
mod recovery;
pub mod resolver;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod types;

pub use config::{DEFAULT_ENDPOINT, ResolverConfig};
pub use error::{BoxError, ResolveError, Result};
pub use jsonrpc::JsonRpcResolver;
pub use resolver::IdentityResolver;
pub use types::{Address, TxHash};
