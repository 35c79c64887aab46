use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "TUBEFETCH_CONFIG";
pub const YTDLP_PATH_ENV: &str = "TUBEFETCH_YTDLP";
pub const PROXY_ENV: &str = "TUBEFETCH_PROXY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Settings for the yt-dlp backed media provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub ytdlp_path: String,
    pub socket_timeout_secs: u32,
    pub user_agent: String,
    pub proxy: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            socket_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36".to_string(),
            proxy: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capacity of the orchestrator -> presentation event channel
    pub event_capacity: usize,
    /// How often the presentation layer drains the event channel
    pub poll_interval_ms: u64,
    /// Host fragments a URL must contain before any network call is attempted
    pub accepted_hosts: Vec<String>,
    pub log_filter: String,
    pub provider: ProviderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
            poll_interval_ms: 100,
            accepted_hosts: vec!["youtube.com".to_string(), "youtu.be".to_string()],
            log_filter: "tubefetch=info".to_string(),
            provider: ProviderConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, overlaid with the JSON file named by `TUBEFETCH_CONFIG` and
    /// then with single-field environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(YTDLP_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            self.provider.ytdlp_path = path;
        }
        if let Some(proxy) = lookup(PROXY_ENV).filter(|v| !v.trim().is_empty()) {
            self.provider.proxy = Some(proxy);
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }
}
