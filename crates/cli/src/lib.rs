//! Bootstrap for the chainauth key store and token issuer.
//!
//! The `chainauth` binary loads a [`config::ServiceConfig`], installs
//! logging, and runs one [`app::Command`] against a file-backed key store.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod logging;

pub use app::{App, Cli, Command};
pub use config::ServiceConfig;
