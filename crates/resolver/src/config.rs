//! Configuration for the JSON-RPC resolver.
//!
//! The node endpoint and chain id are injected rather than compiled in, so
//! one binary can serve any EVM-compatible network.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, Result};

/// Default request timeout (10 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default node endpoint, a local development node.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8545";

/// Configuration for [`JsonRpcResolver`](crate::JsonRpcResolver).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use chainauth_resolver::ResolverConfig;
///
/// let config = ResolverConfig::builder()
///     .endpoint("https://rpc.example.org")
///     .chain_id(11155111)
///     .timeout(Duration::from_secs(5))
///     .build()?;
/// assert_eq!(config.chain_id(), Some(11155111));
/// # Ok::<(), chainauth_resolver::ResolveError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// JSON-RPC endpoint URL.
    #[serde(default = "default_endpoint")]
    pub(crate) endpoint: String,

    /// Chain the transaction must belong to; unchecked when absent.
    #[serde(default)]
    pub(crate) chain_id: Option<u64>,

    /// Per-request timeout.
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub(crate) timeout: Duration,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_owned()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { endpoint: default_endpoint(), chain_id: None, timeout: default_timeout() }
    }
}

#[bon::bon]
impl ResolverConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Optional Fields
    ///
    /// * `chain_id` - Expected chain id (default: unchecked).
    /// * `timeout` - Request timeout (default: 10 seconds).
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Config`] if the endpoint is not an
    /// `http(s)://` URL or the timeout is zero.
    #[builder]
    pub fn new(
        #[builder(into)] endpoint: String,
        chain_id: Option<u64>,
        #[builder(default = DEFAULT_TIMEOUT)] timeout: Duration,
    ) -> Result<Self> {
        let config = Self { endpoint, chain_id, timeout };
        config.validate()?;
        Ok(config)
    }

    /// Checks a configuration loaded through serde.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ResolverConfig::builder`].
    pub fn validate(&self) -> Result<()> {
        let scheme_ok = self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://");
        if !scheme_ok {
            return Err(ResolveError::Config(format!(
                "endpoint '{}' must be an http:// or https:// URL",
                self.endpoint
            )));
        }
        if self.timeout.is_zero() {
            return Err(ResolveError::Config("timeout must be greater than zero".into()));
        }
        Ok(())
    }

    /// JSON-RPC endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Expected chain id, if enforced.
    #[must_use]
    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns a copy pointing at a different endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Config`] if the new endpoint is invalid.
    pub fn with_endpoint(&self, endpoint: impl Into<String>) -> Result<Self> {
        let config = Self { endpoint: endpoint.into(), ..self.clone() };
        config.validate()?;
        Ok(config)
    }
}
