//! Listener and host configuration, persisted as YAML.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tuning for the platform listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Ask the GNOME settings daemon for media-key priority (Linux only).
    pub grab_media_keys: bool,
    /// Upper bound on the grab request round-trip.
    pub grab_timeout_ms: u64,
    /// Bounded wait of one dispatch slice; also bounds shutdown latency.
    pub dispatch_timeout_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            grab_media_keys: true,
            grab_timeout_ms: 500,
            dispatch_timeout_ms: 100,
        }
    }
}

impl ListenerConfig {
    pub fn grab_timeout(&self) -> Duration {
        Duration::from_millis(self.grab_timeout_ms)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms.max(1))
    }
}

/// Configuration of the reference host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Interval between polls of the event queue (one host frame).
    pub poll_interval_ms: u64,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Behave as an editor/authoring context: the listener never starts.
    pub editor: bool,
    pub listener: ListenerConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 16,
            log_filter: "info".into(),
            editor: false,
            listener: ListenerConfig::default(),
        }
    }
}

impl HostConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Default config location: `<config_dir>/mediakeys/config.yaml`.
pub fn default_config_path() -> PathBuf {
    let base = dirs_next::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("mediakeys").join("config.yaml")
}

pub fn load_config(path: &Path) -> ConfigResult<HostConfig> {
    let yaml = fs::read_to_string(path)?;
    let config: HostConfig = serde_yaml::from_str(&yaml)?;
    debug!(?path, "Loaded config");
    Ok(config)
}

/// Load `path`, falling back to defaults when the file does not exist.
pub fn load_config_or_default(path: &Path) -> ConfigResult<HostConfig> {
    if !path.exists() {
        info!(?path, "No config file, using defaults");
        return Ok(HostConfig::default());
    }
    load_config(path)
}

pub fn save_config(path: &Path, config: &HostConfig) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_yaml::to_string(config)?)?;
    info!(?path, "Saved config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "poll_interval_ms: 33\nlistener:\n  grab_media_keys: false\n";
        let config: HostConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.poll_interval_ms, 33);
        assert!(!config.editor);
        assert_eq!(config.log_filter, "info");
        assert!(!config.listener.grab_media_keys);
        assert_eq!(config.listener.grab_timeout_ms, 500);
        assert_eq!(config.listener.dispatch_timeout_ms, 100);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        // save_config creates missing parent directories.
        let path = dir.path().join("mediakeys").join("config.yaml");
        let config = HostConfig {
            editor: true,
            ..HostConfig::default()
        };
        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
        assert_eq!(load_config_or_default(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        assert_eq!(load_config_or_default(&path).unwrap(), HostConfig::default());
        assert!(matches!(load_config(&path), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "poll_interval_ms: [not, a, number]\n").unwrap();
        assert!(matches!(
            load_config_or_default(&path),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_zero_timeouts_are_clamped() {
        let config = ListenerConfig {
            dispatch_timeout_ms: 0,
            ..ListenerConfig::default()
        };
        assert_eq!(config.dispatch_timeout(), Duration::from_millis(1));
    }
}
