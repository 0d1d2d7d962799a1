//! Process configuration.
//!
//! Values come from three layers, highest priority first: command line (or
//! its environment fallbacks), the optional TOML file, built-in defaults.
//! The result is an immutable [`McpConfig`] built once at startup.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.agentql.com/v1/query-data";
pub const DEFAULT_PORT: u16 = 9593;
pub const DEFAULT_ENDPOINT: &str = "/rest";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Reserved by the REST transport.
pub const HEALTH_PATH: &str = "/health";

/// How the server talks to its MCP client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Newline-delimited JSON-RPC on stdin/stdout
    #[default]
    Stdio,
    /// JSON-RPC over HTTP POST
    Rest,
}

/// One layer of partially specified settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigLayer {
    #[serde(default)]
    pub agentql_api_key: Option<String>,
    #[serde(default)]
    pub mode: Option<TransportMode>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    /// Request timeout in seconds; 0 disables the timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ConfigLayer {
    /// Read a TOML config file. A missing file yields an empty layer.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "Configuration file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read configuration file {}", config_path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file {}", config_path.display()))
    }

    /// Overlay `other` on top of `self`; values set in `other` win.
    pub fn merge(self, other: ConfigLayer) -> Self {
        Self {
            agentql_api_key: other.agentql_api_key.or(self.agentql_api_key),
            mode: other.mode.or(self.mode),
            port: other.port.or(self.port),
            endpoint: other.endpoint.or(self.endpoint),
            api_url: other.api_url.or(self.api_url),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
        }
    }

    /// Fill in defaults and validate.
    pub fn resolve(self) -> Result<McpConfig> {
        let api_url = self.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
        let api_url = Url::parse(api_url).with_context(|| format!("Invalid API URL: {}", api_url))?;
        if api_url.scheme() != "http" && api_url.scheme() != "https" {
            bail!("API URL must be http or https, got: {}", api_url.scheme());
        }

        let endpoint = self.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        if !endpoint.starts_with('/') {
            bail!("REST endpoint must start with '/', got: {}", endpoint);
        }
        if endpoint == HEALTH_PATH {
            bail!("REST endpoint cannot be {}", HEALTH_PATH);
        }

        let request_timeout = match self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(McpConfig {
            api_key: self.agentql_api_key.filter(|key| !key.is_empty()),
            mode: self.mode.unwrap_or_default(),
            port: self.port.unwrap_or(DEFAULT_PORT),
            endpoint,
            api_url,
            request_timeout,
        })
    }
}

/// Resolved process configuration.
#[derive(Debug, Clone)]
pub struct McpConfig {
    /// Default API key used when a call carries none of its own.
    pub api_key: Option<String>,
    pub mode: TransportMode,
    pub port: u16,
    pub endpoint: String,
    /// Extraction service endpoint.
    pub api_url: Url,
    /// `None` leaves the HTTP client without a timeout.
    pub request_timeout: Option<Duration>,
}

impl McpConfig {
    /// Load the file at `config_path` (if any) and overlay `overrides`.
    pub fn load(config_path: &Path, overrides: ConfigLayer) -> Result<Self> {
        ConfigLayer::load(config_path)?.merge(overrides).resolve()
    }

    pub fn has_default_key(&self) -> bool {
        self.api_key.is_some()
    }
}
