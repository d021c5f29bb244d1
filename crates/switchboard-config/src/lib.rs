//! Configuration for the Switchboard gateway
//!
//! Loaded from a TOML file whose `{{ env.VAR }}` placeholders are expanded
//! before parsing. Vendor credentials are captured into an immutable
//! [`Credentials`] snapshot that adapters are built from.

#![allow(clippy::must_use_candidate)]

pub mod cors;
pub mod credentials;
mod env;
mod loader;
pub mod server;
pub mod telemetry;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;

pub use cors::*;
pub use credentials::Credentials;
pub use server::*;
pub use telemetry::{LogFormat, TelemetryConfig};

/// Top-level Switchboard configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Vendor credentials and endpoints, overlaid on the process environment
    #[serde(default)]
    pub credentials: IndexMap<String, SecretString>,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
