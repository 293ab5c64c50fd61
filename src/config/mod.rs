//! Runtime configuration.
//!
//! Loaded from an optional TOML file in the platform config directory, with
//! `QUAY_*` environment overrides on top; CLI flags override both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the orchestration API.
    pub api_url: String,
    /// Push channel endpoint. When unset it is derived from `api_url`.
    pub ws_url: Option<String>,
    /// Full directory refetch cadence.
    pub poll_interval_secs: u64,
    /// Delay between a mutation acknowledgement and its follow-up refetch.
    pub settle_delay_ms: u64,
    /// Issue start commands for enabled-but-stopped services after each sync.
    pub auto_start: bool,
    #[serde(skip)]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            auto_start: true,
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to
    /// defaults when no file exists, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config")?;
        Ok(config)
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quay")
            .join("config.toml")
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("QUAY_API_URL") {
            self.api_url = url;
        }
        if let Ok(url) = std::env::var("QUAY_WS_URL") {
            self.ws_url = Some(url);
        }
        if let Ok(secs) = std::env::var("QUAY_POLL_INTERVAL_SECS") {
            if let Ok(secs) = secs.parse() {
                self.poll_interval_secs = secs;
            }
        }
        if let Ok(ms) = std::env::var("QUAY_SETTLE_DELAY_MS") {
            if let Ok(ms) = ms.parse() {
                self.settle_delay_ms = ms;
            }
        }
        if let Ok(flag) = std::env::var("QUAY_AUTO_START") {
            self.auto_start = flag != "0" && !flag.eq_ignore_ascii_case("false");
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(ConfigError::InvalidEndpoint {
                url: self.api_url.clone(),
            }
            .into());
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidFormat {
                reason: "poll_interval_secs must be non-zero".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Push channel URL: explicit `ws_url`, or the API URL with the scheme
    /// swapped to websocket and `/ws` appended.
    pub fn push_url(&self) -> String {
        match &self.ws_url {
            Some(url) => url.clone(),
            None => {
                let base = self.api_url.trim_end_matches('/');
                let swapped = if let Some(rest) = base.strip_prefix("https://") {
                    format!("wss://{rest}")
                } else if let Some(rest) = base.strip_prefix("http://") {
                    format!("ws://{rest}")
                } else {
                    base.to_string()
                };
                format!("{swapped}/ws")
            }
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_url_is_derived_from_api_url() {
        let config = Config {
            api_url: "http://localhost:8000/api".to_string(),
            ..Config::default()
        };
        assert_eq!(config.push_url(), "ws://localhost:8000/api/ws");

        let config = Config {
            api_url: "https://orch.example.com/api/".to_string(),
            ..Config::default()
        };
        assert_eq!(config.push_url(), "wss://orch.example.com/api/ws");

        let config = Config {
            ws_url: Some("ws://elsewhere:9000/push".to_string()),
            ..Config::default()
        };
        assert_eq!(config.push_url(), "ws://elsewhere:9000/push");
    }

    #[test]
    fn validate_rejects_non_http_endpoint() {
        let config = Config {
            api_url: "ftp://nope".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str("api_url = \"http://box:1234/api\"").unwrap();
        assert_eq!(config.api_url, "http://box:1234/api");
        assert_eq!(config.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
        assert!(config.auto_start);
    }
}
