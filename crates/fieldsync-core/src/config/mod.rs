//! Engine configuration persisted as JSON.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Base URL of the remote API, e.g. `https://ptms.example.com/api/`
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default = "default_download_window_days")]
    pub download_window_days: u32,
    #[serde(default = "default_media_max_attempts")]
    pub media_max_attempts: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,
}

/// Reachability probe tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
    /// Successful answers slower than this are reported as slow
    #[serde(default = "default_slow_threshold_ms")]
    pub slow_threshold_ms: u64,
    /// Health endpoint, relative to `server_url`
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

const fn default_download_window_days() -> u32 {
    30
}

const fn default_media_max_attempts() -> u32 {
    3
}

const fn default_request_timeout_ms() -> u64 {
    30_000
}

const fn default_monitor_interval_secs() -> u64 {
    30
}

const fn default_probe_timeout_ms() -> u64 {
    3_000
}

const fn default_slow_threshold_ms() -> u64 {
    2_000
}

fn default_health_path() -> String {
    "api/health.php".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            download_window_days: default_download_window_days(),
            media_max_attempts: default_media_max_attempts(),
            request_timeout_ms: default_request_timeout_ms(),
            probe: ProbeConfig::default(),
            monitor_interval_secs: default_monitor_interval_secs(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_probe_timeout_ms(),
            slow_threshold_ms: default_slow_threshold_ms(),
            health_path: default_health_path(),
        }
    }
}

impl ProbeConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub const fn slow_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_threshold_ms)
    }
}

impl EngineConfig {
    /// Load from disk; a missing file yields the defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!(
                "Failed to read config at {}: {}",
                path.display(),
                error
            ))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!(
                "Failed to parse config at {}: {}",
                path.display(),
                error
            ))
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                Error::Config(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                ))
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(path, serialized).map_err(|error| {
            Error::Config(format!(
                "Failed to write config at {}: {}",
                path.display(),
                error
            ))
        })
    }

    pub fn normalize(&mut self) {
        self.server_url = normalize_text_option(self.server_url.take());
        let health_path = self.probe.health_path.trim().trim_start_matches('/');
        self.probe.health_path = if health_path.is_empty() {
            default_health_path()
        } else {
            health_path.to_string()
        };
    }

    /// The configured server URL, validated
    pub fn server_url(&self) -> Result<&str> {
        let url = self
            .server_url
            .as_deref()
            .ok_or_else(|| Error::Config("No server URL configured".to_string()))?;
        if !is_http_url(url) {
            return Err(Error::Config(format!(
                "Server URL must start with http:// or https://: {url}"
            )));
        }
        Ok(url)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub const fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }
}
