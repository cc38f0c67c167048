//! Configuration loader and validator for the push dispatch service.
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
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
    pub server: Server,
    pub vapid: VapidConfig,
    #[serde(default)]
    pub push: PushConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    pub listen_address: String,
}

/// Process-wide VAPID credentials. Read once at startup, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VapidConfig {
    /// Contact for the push service operator: `mailto:` or `https://` URI.
    pub subject: String,
    /// Base64url uncompressed P-256 point, handed to browsers as `applicationServerKey`.
    pub public_key: String,
    /// Base64url raw 32-byte P-256 scalar.
    pub private_key: String,
}

/// Per-message delivery settings passed to the push transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushConfig {
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_ttl_seconds() -> u32 {
    // four weeks
    2_419_200
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl PushConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Config {
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .listen_address
            .parse()
            .map_err(|_| ConfigError::Invalid("server.listen_address must be host:port"))
    }

    /// Let `VAPID_PUBLIC_KEY` / `VAPID_PRIVATE_KEY` override the file, so keys
    /// can stay out of the YAML.
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("VAPID_PUBLIC_KEY") {
            self.vapid.public_key = key;
        }
        if let Ok(key) = std::env::var("VAPID_PRIVATE_KEY") {
            self.vapid.private_key = key;
        }
    }
}

/// Load configuration from a YAML file, apply environment overrides and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    cfg.apply_env();
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.server.listen_address.trim().is_empty() {
        return Err(ConfigError::Invalid("server.listen_address must be non-empty"));
    }
    cfg.listen_addr()?;

    let subject = cfg.vapid.subject.trim();
    if !(subject.starts_with("mailto:") || subject.starts_with("https://")) {
        return Err(ConfigError::Invalid(
            "vapid.subject must be a mailto: or https:// URI",
        ));
    }

    let public = URL_SAFE_NO_PAD
        .decode(cfg.vapid.public_key.trim_end_matches('='))
        .map_err(|_| ConfigError::Invalid("vapid.public_key must be base64url"))?;
    if public.len() != 65 || public[0] != 0x04 {
        return Err(ConfigError::Invalid(
            "vapid.public_key must be a 65-byte uncompressed P-256 point",
        ));
    }

    let private = URL_SAFE_NO_PAD
        .decode(cfg.vapid.private_key.trim_end_matches('='))
        .map_err(|_| ConfigError::Invalid("vapid.private_key must be base64url"))?;
    if private.len() != 32 {
        return Err(ConfigError::Invalid(
            "vapid.private_key must be a 32-byte P-256 scalar",
        ));
    }

    if cfg.push.request_timeout_ms == 0 {
        return Err(ConfigError::Invalid("push.request_timeout_ms must be > 0"));
    }

    Ok(())
}

/// Returns a complete example configuration.
pub fn example() -> &'static str {
    r#"server:
  listen_address: "127.0.0.1:3000"

vapid:
  subject: "mailto:example@example.com"
  public_key: "BJhRxOx05VZ7Yd9vmpvlibidolVdM-jjDJDDXSAZh8bTBcHLWJFT6dCwGViQ0SbnlDo-GGQoFuDKOuJvsieSs2Q"
  private_key: "0i6DUp65PQ0QCUEX1vJOxO3ya4ZH8n998JbA5JjLUP0"

push:
  ttl_seconds: 2419200
  request_timeout_ms: 10000
"#
}
