//! Deployment configuration.
//!
//! A [`StoreConfig`] is always passed explicitly; nothing is read from the
//! environment. It can be built in code or parsed from TOML:
//!
//! ```toml
//! mode = "remote-self-hosted"
//!
//! [remote]
//! host = "localhost"
//! port = 6334
//! ```

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which backend a deployment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    EmbeddedLocal,
    RemoteManaged,
    RemoteSelfHosted,
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::EmbeddedLocal => "embedded-local",
            DeploymentMode::RemoteManaged => "remote-managed",
            DeploymentMode::RemoteSelfHosted => "remote-self-hosted",
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedded-local" | "local" => Ok(DeploymentMode::EmbeddedLocal),
            "remote-managed" | "cloud" => Ok(DeploymentMode::RemoteManaged),
            "remote-self-hosted" | "self-hosted" => Ok(DeploymentMode::RemoteSelfHosted),
            other => Err(StoreError::invalid(format!(
                "unknown deployment mode '{}' (expected embedded-local, remote-managed or remote-self-hosted)",
                other
            ))),
        }
    }
}

/// Settings for the embedded backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedConfig {
    pub persist_path: Option<PathBuf>,
    /// WAL entries between snapshots.
    pub checkpoint_interval: usize,
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        Self {
            persist_path: None,
            checkpoint_interval: 1000,
        }
    }
}

/// Settings for the remote backend. Which fields matter depends on the mode.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub host: Option<String>,
    /// Kept wide so out-of-range values are reported, not rejected by the parser.
    pub port: Option<i64>,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_concurrent_requests: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            host: None,
            port: None,
            timeout_secs: 30,
            connect_timeout_secs: 5,
            max_concurrent_requests: 32,
        }
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .finish()
    }
}

/// Complete deployment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// One of the [`DeploymentMode`] names or aliases.
    pub mode: String,
    pub embedded: EmbeddedConfig,
    pub remote: RemoteConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mode: DeploymentMode::EmbeddedLocal.as_str().to_string(),
            embedded: EmbeddedConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Embedded deployment persisting under `path`.
    pub fn embedded(path: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.embedded.persist_path = Some(path.into());
        config
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| StoreError::config("config", e.to_string()))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            StoreError::config("config", format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn deployment_mode(&self) -> Result<DeploymentMode> {
        self.mode.parse()
    }
}
