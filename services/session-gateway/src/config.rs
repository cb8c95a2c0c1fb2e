//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The downstream API key is loaded from FIREBASE_API_KEY or api_key_file,
//! never stored in the TOML directly.

use common::Secret;
use identity::ProviderConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub downstream: DownstreamConfig,
    pub gateway: GatewayConfig,
}

/// Application backend hosting the minting endpoint
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub api_root: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Real-time backend sign-in
#[derive(Debug, Deserialize)]
pub struct DownstreamConfig {
    #[serde(skip)]
    pub api_key: Option<Secret<String>>,
    /// Path to a file containing the API key (alternative to FIREBASE_API_KEY)
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

/// HTTP surface and session options
#[derive(Debug, Deserialize)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_credential_path")]
    pub credential_path: PathBuf,
    #[serde(default = "default_route")]
    pub default_route: String,
    #[serde(default = "default_renewal_secs")]
    pub renewal_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_file: None,
            endpoint: default_endpoint(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_endpoint() -> String {
    downstream::firebase::DEFAULT_ENDPOINT.to_string()
}

fn default_credential_path() -> PathBuf {
    PathBuf::from("session-credentials.json")
}

fn default_route() -> String {
    "/".to_string()
}

fn default_renewal_secs() -> u64 {
    3600
}

fn default_max_connections() -> usize {
    64
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// API key resolution order:
    /// 1. FIREBASE_API_KEY env var
    /// 2. api_key_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        if let Ok(key) = std::env::var("FIREBASE_API_KEY") {
            config.downstream.api_key = Some(Secret::new(key));
        } else if let Some(ref key_file) = config.downstream.api_key_file {
            let key = std::fs::read_to_string(key_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read api_key_file {}: {e}",
                    key_file.display()
                ))
            })?;
            let key = key.trim().to_owned();
            if !key.is_empty() {
                config.downstream.api_key = Some(Secret::new(key));
            }
        }

        if config.downstream.api_key.is_none() {
            return Err(common::Error::Config(
                "downstream API key missing: set FIREBASE_API_KEY or downstream.api_key_file"
                    .into(),
            ));
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        let provider = &self.provider;
        for (field, value) in [
            ("client_id", &provider.client_id),
            ("domain", &provider.domain),
            ("redirect_uri", &provider.redirect_uri),
            ("audience", &provider.audience),
            ("scope", &provider.scope),
        ] {
            if value.trim().is_empty() {
                return Err(common::Error::Config(format!(
                    "provider.{field} must not be empty"
                )));
            }
        }

        if provider.domain.contains("://") {
            return Err(common::Error::Config(format!(
                "provider.domain must not include a scheme, got: {}",
                provider.domain
            )));
        }

        if !is_http_url(&provider.redirect_uri) {
            return Err(common::Error::Config(format!(
                "provider.redirect_uri must start with http:// or https://, got: {}",
                provider.redirect_uri
            )));
        }

        if !is_http_url(&self.api.api_root) {
            return Err(common::Error::Config(format!(
                "api.api_root must start with http:// or https://, got: {}",
                self.api.api_root
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.gateway.renewal_secs == 0 {
            return Err(common::Error::Config(
                "gateway.renewal_secs must be greater than 0".into(),
            ));
        }

        if self.gateway.max_connections == 0 {
            return Err(common::Error::Config(
                "gateway.max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("session-gateway.toml")
    }
}
