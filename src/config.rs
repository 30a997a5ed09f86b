//! Configuration loader and validator for the entry synchronizer.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub backend: Backend,
    pub sync: SyncSettings,
}

/// REST backend settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Backend {
    pub base_url: String,
    /// Bearer token; empty means requests are sent unauthenticated.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Per-row synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncSettings {
    pub request_timeout_ms: u64,
}

fn default_user_agent() -> String {
    "hefti/0.1".to_string()
}

impl Config {
    /// Base URL with a trailing slash, so relative joins land beneath it.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let mut raw = self.backend.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw).map_err(|_| ConfigError::Invalid("backend.base_url must be an absolute URL"))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Invalid("backend.base_url must use http or https"));
        }
        Ok(url)
    }

    pub fn bearer_token(&self) -> Option<&str> {
        let token = self.backend.token.trim();
        (!token.is_empty()).then_some(token)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.sync.request_timeout_ms)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.backend.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("backend.base_url must be non-empty"));
    }
    cfg.base_url()?;
    if cfg.backend.user_agent.trim().is_empty() {
        return Err(ConfigError::Invalid("backend.user_agent must be non-empty"));
    }
    if cfg.sync.request_timeout_ms == 0 {
        return Err(ConfigError::Invalid("sync.request_timeout_ms must be > 0"));
    }
    Ok(())
}

/// Returns the sample YAML shipped with the binary.
pub fn example() -> &'static str {
    r#"backend:
  base_url: "http://localhost:8000/api/"
  token: ""
  user_agent: "hefti/0.1"

sync:
  request_timeout_ms: 10000
"#
}
