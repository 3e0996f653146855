//! Server configuration.
//!
//! Values come from an optional TOML file, then CLI flags and environment
//! variables on top:
//!
//! ```toml
//! listen_addr = "127.0.0.1:3001"
//! settings_path = "settings.json"
//! mle_enabled = true
//! cors_origins = ["http://localhost:3000"]
//! error_mapping_path = "error-mapping.json"
//!
//! [http]
//! timeout_secs = 30
//! connect_timeout_secs = 10
//! http_version = "auto"
//! ```

use std::{
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

use clap::Parser;
use serde::{Deserialize, Serialize};
use vdp_sandbox::{orchestrator::DEFAULT_USER_AGENT, transport::HttpConfig};

use crate::error::ConfigError;

/// Default request body limit, 50 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// JSON file holding the saved credential bundle.
    pub settings_path: PathBuf,
    /// Whether Message Level Encryption is offered at all.
    pub mle_enabled: bool,
    /// Upstream timeouts and protocol preference.
    pub http: HttpConfig,
    /// Browser origins allowed by CORS.
    pub cors_origins: Vec<String>,
    /// Optional JSON file extending the error code table.
    pub error_mapping_path: Option<PathBuf>,
    /// `User-Agent` sent upstream.
    pub user_agent: String,
    /// Maximum accepted request body in bytes.
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 3001)),
            settings_path: PathBuf::from("settings.json"),
            mle_enabled: true,
            http: HttpConfig::default(),
            cors_origins: vec!["http://localhost:3000".to_owned(), "http://127.0.0.1:3000".to_owned()],
            error_mapping_path: None,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            body_limit_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ServerConfig {
    /// Parses configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or unknown keys.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let toml = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
        Self::from_toml(&toml)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http.validate().map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.body_limit_bytes == 0 {
            return Err(ConfigError::Invalid("body_limit_bytes must be positive".to_owned()));
        }
        if self.user_agent.trim().is_empty() || self.user_agent.contains(['\r', '\n', '\0']) {
            return Err(ConfigError::Invalid("user_agent must be a non-empty header value".to_owned()));
        }
        if let Some(origin) = self
            .cors_origins
            .iter()
            .find(|origin| !(origin.starts_with("http://") || origin.starts_with("https://")))
        {
            return Err(ConfigError::Invalid(format!("CORS origin {origin:?} must be an http(s) URL")));
        }
        Ok(())
    }
}

/// Command line interface.
#[derive(Debug, Default, Parser)]
#[command(name = "vdp-sandbox-server", version, about = "VDP sandbox backend")]
pub struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "VDP_SANDBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address, e.g. 127.0.0.1:3001.
    #[arg(short, long, env = "VDP_SANDBOX_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Settings file path.
    #[arg(long, env = "VDP_SANDBOX_SETTINGS")]
    pub settings_path: Option<PathBuf>,

    /// Enable or disable Message Level Encryption.
    #[arg(long, env = "VDP_SANDBOX_MLE")]
    pub mle_enabled: Option<bool>,

    /// Upstream request timeout in seconds.
    #[arg(long, env = "VDP_SANDBOX_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Allowed CORS origins, comma-separated.
    #[arg(long, env = "VDP_SANDBOX_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// JSON file extending the error code table.
    #[arg(long, env = "VDP_SANDBOX_ERROR_MAPPING")]
    pub error_mapping: Option<PathBuf>,

    /// User-Agent sent upstream.
    #[arg(long, env = "VDP_SANDBOX_USER_AGENT")]
    pub user_agent: Option<String>,
}

impl Cli {
    /// Loads the configuration file, if any, applies overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be loaded or the result is invalid.
    pub fn resolve(self) -> Result<ServerConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };
        let config = self.apply(base);
        config.validate()?;
        Ok(config)
    }

    /// Overrides `config` with every flag that was given.
    #[must_use]
    pub fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(listen) = self.listen {
            config.listen_addr = listen;
        }
        if let Some(path) = self.settings_path {
            config.settings_path = path;
        }
        if let Some(enabled) = self.mle_enabled {
            config.mle_enabled = enabled;
        }
        if let Some(timeout) = self.timeout_secs {
            config.http.timeout_secs = timeout;
        }
        let origins: Vec<String> =
            self.cors_origins.into_iter().filter(|origin| !origin.trim().is_empty()).collect();
        if !origins.is_empty() {
            config.cors_origins = origins;
        }
        if let Some(path) = self.error_mapping {
            config.error_mapping_path = Some(path);
        }
        if let Some(user_agent) = self.user_agent {
            config.user_agent = user_agent;
        }
        config
    }
}
