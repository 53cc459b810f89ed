//! Configuration validation and backend construction.
//!
//! Validation runs before any adapter exists: every deployment mode has a
//! closed set of required settings, and a missing or inconsistent one is a
//! [`StoreError::Configuration`] naming the setting. There is no fallback
//! from one mode to another.

use crate::config::{DeploymentMode, StoreConfig};
use crate::embedded::EmbeddedStore;
use crate::error::{Result, StoreError};
use crate::remote::{RemoteEndpoint, RemoteSettings, RemoteStore};
use crate::store::VectorStore;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A configuration that passed validation, reduced to what the backend needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedBackend {
    Embedded {
        persist_path: PathBuf,
        checkpoint_interval: usize,
    },
    Remote(RemoteSettings),
}

fn required(value: &Option<String>, setting: &str, why: &str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(StoreError::config(setting, why)),
    }
}

/// Validate a configuration without constructing anything.
pub fn validate(config: &StoreConfig) -> Result<ValidatedBackend> {
    match config.deployment_mode()? {
        DeploymentMode::EmbeddedLocal => {
            let persist_path = match &config.embedded.persist_path {
                Some(p) if !p.as_os_str().is_empty() => p.clone(),
                _ => {
                    return Err(StoreError::config(
                        "embedded.persist_path",
                        "embedded-local mode requires a persist path",
                    ))
                }
            };
            if config.embedded.checkpoint_interval == 0 {
                return Err(StoreError::config(
                    "embedded.checkpoint_interval",
                    "must be greater than zero",
                ));
            }
            probe_writable(&persist_path)?;
            Ok(ValidatedBackend::Embedded {
                persist_path,
                checkpoint_interval: config.embedded.checkpoint_interval,
            })
        }
        DeploymentMode::RemoteManaged => {
            let url = required(
                &config.remote.url,
                "remote.url",
                "remote-managed mode requires the service URL",
            )?;
            let api_key = required(
                &config.remote.api_key,
                "remote.api_key",
                "remote-managed mode requires an API key",
            )?;
            remote_settings(config, RemoteEndpoint::Managed { url, api_key })
        }
        DeploymentMode::RemoteSelfHosted => {
            let host = required(
                &config.remote.host,
                "remote.host",
                "remote-self-hosted mode requires a host",
            )?;
            let port = match config.remote.port {
                Some(p) => u16::try_from(p).ok().filter(|p| *p != 0).ok_or_else(|| {
                    StoreError::config("remote.port", format!("port {} is outside 1..=65535", p))
                })?,
                None => {
                    return Err(StoreError::config(
                        "remote.port",
                        "remote-self-hosted mode requires a port",
                    ))
                }
            };
            remote_settings(config, RemoteEndpoint::SelfHosted { host, port })
        }
    }
}

fn remote_settings(config: &StoreConfig, endpoint: RemoteEndpoint) -> Result<ValidatedBackend> {
    let remote = &config.remote;
    if remote.max_concurrent_requests == 0 {
        return Err(StoreError::config(
            "remote.max_concurrent_requests",
            "must be greater than zero",
        ));
    }
    if remote.timeout_secs == 0 {
        return Err(StoreError::config("remote.timeout_secs", "must be greater than zero"));
    }
    Ok(ValidatedBackend::Remote(RemoteSettings {
        endpoint,
        timeout: Duration::from_secs(remote.timeout_secs),
        connect_timeout: Duration::from_secs(remote.connect_timeout_secs.max(1)),
        max_concurrent_requests: remote.max_concurrent_requests,
    }))
}

/// The path itself may not exist yet; its nearest existing ancestor must be
/// a directory we can create a file in.
fn probe_writable(path: &Path) -> Result<()> {
    let setting = "embedded.persist_path";
    let ancestor = path
        .ancestors()
        .find(|p| p.exists())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    if !ancestor.is_dir() {
        return Err(StoreError::config(
            setting,
            format!("{} is not a directory", ancestor.display()),
        ));
    }

    let probe = tempfile::Builder::new()
        .prefix(".vstore-probe-")
        .tempfile_in(&ancestor)
        .map_err(|e| {
            StoreError::config(
                setting,
                format!("{} is not writable: {}", ancestor.display(), e),
            )
        })?;
    probe.close().map_err(|e| {
        StoreError::config(
            setting,
            format!("cannot remove probe in {}: {}", ancestor.display(), e),
        )
    })?;
    Ok(())
}

/// Validate `config` and construct the matching adapter, uninitialized.
pub fn create_store(config: &StoreConfig) -> Result<Box<dyn VectorStore>> {
    let store: Box<dyn VectorStore> = match validate(config)? {
        ValidatedBackend::Embedded {
            persist_path,
            checkpoint_interval,
        } => {
            tracing::info!(path = %persist_path.display(), "using embedded backend");
            Box::new(EmbeddedStore::new(persist_path, checkpoint_interval))
        }
        ValidatedBackend::Remote(settings) => {
            tracing::info!(url = %settings.endpoint.url(), "using remote backend");
            Box::new(RemoteStore::new(settings))
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn self_hosted(host: Option<&str>, port: Option<i64>) -> StoreConfig {
        let mut config = StoreConfig::default();
        config.mode = "remote-self-hosted".to_string();
        config.remote.host = host.map(String::from);
        config.remote.port = port;
        config
    }

    #[test]
    fn test_port_bounds() {
        assert!(validate(&self_hosted(Some("localhost"), Some(6334))).is_ok());
        for bad in [0, -1, 65536] {
            let err = validate(&self_hosted(Some("localhost"), Some(bad))).unwrap_err();
            assert!(matches!(err, StoreError::Configuration { setting, .. } if setting == "remote.port"));
        }
    }

    #[test]
    fn test_blank_host_rejected() {
        let err = validate(&self_hosted(Some("   "), Some(6334))).unwrap_err();
        assert!(matches!(err, StoreError::Configuration { setting, .. } if setting == "remote.host"));
    }

    #[test]
    fn test_probe_uses_nearest_existing_ancestor() {
        let dir = TempDir::new().unwrap();
        let deep = dir.path().join("a").join("b").join("db");
        assert!(probe_writable(&deep).is_ok());
        assert!(!deep.exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_concurrent_validations_share_an_ancestor() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let root = root.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|_| validate(&StoreConfig::embedded(root.join(format!("db{}", i)))).is_err())
                        .count()
                })
            })
            .collect();

        let failures: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(failures, 0);
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }

    #[test]
    fn test_file_ancestor_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain-file");
        std::fs::write(&file, b"x").unwrap();
        let err = probe_writable(&file.join("db")).unwrap_err();
        assert!(matches!(err, StoreError::Configuration { .. }));
    }
}
