//! Service configuration.
//!
//! Loaded from a JSON file; every section has defaults, so an empty object
//! (or no file at all) is a valid configuration.
//!
//! ```json
//! {
//!   "keys": { "dir": "/var/lib/chainauth/keys" },
//!   "resolver": { "endpoint": "https://rpc.example.org", "chain_id": 1, "timeout": "10s" },
//!   "resolve_timeout": "15s",
//!   "claims": { "policy_id": 0, "map_layers": ["beaches"], "map_database": "hkopendata" },
//!   "logging": { "level": "info", "file": "chainauth.log" }
//! }
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use chainauth_authn::{AuthorizationClaims, DEFAULT_RESOLVE_TIMEOUT};
use chainauth_keystore::DEFAULT_KEY_DIR;
use chainauth_resolver::ResolverConfig;
use serde::{Deserialize, Serialize};

/// Where the key store files live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeysConfig {
    /// Directory holding `private.json` and `public.json`.
    pub dir: PathBuf,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self { dir: PathBuf::from(DEFAULT_KEY_DIR) }
    }
}

/// Log filtering and destinations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Optional file that receives a plain-text copy of every log line.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), file: None }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Key store location.
    pub keys: KeysConfig,
    /// JSON-RPC node used to resolve senders.
    pub resolver: ResolverConfig,
    /// Upper bound on one resolution, including cancellation.
    #[serde(with = "humantime_serde")]
    pub resolve_timeout: Duration,
    /// Metadata stamped into issued tokens.
    pub claims: AuthorizationClaims,
    /// Logging setup.
    pub logging: LoggingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            keys: KeysConfig::default(),
            resolver: ResolverConfig::default(),
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            claims: AuthorizationClaims::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Reads and validates a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Applies command-line overrides on top of the file.
    pub fn with_overrides(mut self, key_dir: Option<PathBuf>, endpoint: Option<&str>) -> Result<Self> {
        if let Some(dir) = key_dir {
            self.keys.dir = dir;
        }
        if let Some(endpoint) = endpoint {
            self.resolver = self.resolver.with_endpoint(endpoint).context("invalid --endpoint")?;
        }
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        self.resolver.validate().context("invalid resolver section")?;
        anyhow::ensure!(!self.resolve_timeout.is_zero(), "resolve_timeout must be non-zero");
        Ok(())
    }
}
