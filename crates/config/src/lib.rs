//! Bulwark configuration structures to map the bulwark.toml configuration.

#![deny(missing_docs)]

mod csrf;
mod http_method;
mod http_types;
mod loader;
mod login;
mod session;

use std::{
    borrow::Cow,
    net::SocketAddr,
    path::{Path, PathBuf},
};

pub use csrf::{CsrfConfig, RequestMatcherConfig, SessionAuthenticationConfig};
pub use http_method::HttpMethod;
pub use http_types::HeaderName;
pub use login::{LoginConfig, UserConfig};
pub use session::SessionConfig;
use serde::Deserialize;

/// Main configuration structure for the Bulwark application.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates the parts of the configuration serde cannot check on its own.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate(self)
    }
}

/// HTTP server configuration settings.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on.
    pub listen_address: Option<SocketAddr>,
    /// TLS configuration for secure connections.
    pub tls: Option<TlsServerConfig>,
    /// Health endpoint configuration.
    #[serde(default)]
    pub health: HealthConfig,
    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,
    /// CSRF configuration
    #[serde(default)]
    pub csrf: CsrfConfig,
    /// Form login configuration
    #[serde(default)]
    pub login: LoginConfig,
}

/// TLS configuration for secure connections.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsServerConfig {
    /// Path to the TLS certificate PEM file.
    pub certificate: PathBuf,
    /// Path to the TLS private key PEM file.
    pub key: PathBuf,
}

/// Health endpoint configuration.
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the health endpoint is enabled.
    pub enabled: bool,
    /// The path for the health endpoint.
    pub path: Cow<'static, str>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            enabled: true,
            path: Cow::Borrowed("/health"),
        }
    }
}
