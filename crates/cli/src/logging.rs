//! Tracing subscriber setup.
//!
//! Log lines go to stderr so that stdout carries only command output. When
//! [`LoggingConfig::file`] is set, the same lines are appended to that file
//! without ANSI colouring. `RUST_LOG` takes precedence over
//! [`LoggingConfig::level`].

use std::{
    fs::{File, OpenOptions},
    path::Path,
    sync::Mutex,
};

use anyhow::{Context, Result};
use tracing::Subscriber;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;

/// `RUST_LOG` wins over the configured level.
fn env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'")),
    }
}

fn open_log_file(path: &Path) -> Result<Mutex<File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    Ok(Mutex::new(file))
}

/// Builds the subscriber: stderr always, plus an uncoloured copy in the
/// configured log file.
///
/// # Errors
///
/// Fails if the level is not a valid filter directive or the log file
/// cannot be opened for appending.
pub fn subscriber(config: &LoggingConfig) -> Result<impl Subscriber + Send + Sync + 'static> {
    let file_layer = match &config.file {
        Some(path) => {
            Some(fmt::layer().with_ansi(false).with_target(false).with_writer(open_log_file(path)?))
        },
        None => None,
    };

    Ok(tracing_subscriber::registry()
        .with(env_filter(&config.level)?)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer))
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if [`subscriber`] does, or if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<()> {
    tracing::subscriber::set_global_default(subscriber(config)?)
        .context("a global subscriber is already installed")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_file_layer_receives_plain_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("chainauth.log");
        let config = LoggingConfig { level: "info".into(), file: Some(path.clone()) };

        tracing::subscriber::with_default(subscriber(&config).unwrap(), || {
            tracing::info!(kid = "0007", "Generated signing key");
            tracing::debug!("filtered out");
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Generated signing key"), "got: {contents}");
        assert!(contents.contains("kid=\"0007\""), "got: {contents}");
        assert!(!contents.contains('\u{1b}'), "file output must not carry ANSI escapes");
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(!contents.contains("filtered out"));
        }
    }

    #[test]
    fn test_log_file_in_missing_directory_is_an_error() {
        let config = LoggingConfig {
            level: "info".into(),
            file: Some(PathBuf::from("/nonexistent/dir/chainauth.log")),
        };
        assert!(subscriber(&config).is_err());
    }
}
