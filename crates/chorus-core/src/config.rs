use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SYNAPSE_DISPLAY_MS: u64 = 3_000;

pub const BASE_URL_ENV: &str = "CHORUS_BASE_URL";
pub const REQUEST_TIMEOUT_ENV: &str = "CHORUS_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long a display layer should keep drawing a synapse edge.
    #[serde(default = "default_synapse_display_ms")]
    pub synapse_display_ms: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_synapse_display_ms() -> u64 {
    DEFAULT_SYNAPSE_DISPLAY_MS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            synapse_display_ms: default_synapse_display_ms(),
        }
    }
}

impl ClientConfig {
    /// Get the path to the user config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            Error::Configuration("Could not determine config directory".to_string())
        })?;
        Ok(config_dir.join("chorus").join("config.toml"))
    }

    /// Load the user config file and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Ok(Self::load_from(&path)?.with_env_overrides())
    }

    /// Load from an explicit path, or return defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config file at {:?}: {}. Using defaults.",
                    path,
                    e
                );
                Ok(Self::default())
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn with_env_overrides(self) -> Self {
        let base_url = std::env::var(BASE_URL_ENV).ok();
        let timeout = std::env::var(REQUEST_TIMEOUT_ENV).ok();
        self.with_overrides(base_url.as_deref(), timeout.as_deref())
    }

    fn with_overrides(mut self, base_url: Option<&str>, timeout_secs: Option<&str>) -> Self {
        if let Some(url) = base_url.map(str::trim).filter(|value| !value.is_empty()) {
            self.base_url = url.to_string();
        }

        match timeout_secs.map(|value| value.trim().parse::<u64>()) {
            Some(Ok(secs)) if secs > 0 => self.request_timeout_secs = secs,
            Some(_) => tracing::warn!(
                "Ignoring invalid {} value; keeping {}s",
                REQUEST_TIMEOUT_ENV,
                self.request_timeout_secs
            ),
            None => {}
        }

        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn synapse_display(&self) -> chrono::Duration {
        i64::try_from(self.synapse_display_ms)
            .ok()
            .and_then(chrono::Duration::try_milliseconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url = \"http://panel.internal:9000\"").unwrap();

        let config = ClientConfig::load_from(file.path()).unwrap();
        assert_eq!(config.base_url, "http://panel.internal:9000");
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.synapse_display().num_milliseconds(), 3_000);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml syntax {{").unwrap();

        let config = ClientConfig::load_from(file.path()).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = ClientConfig {
            base_url: "https://chorus.example".into(),
            request_timeout_secs: 5,
            synapse_display_ms: 1_500,
        };

        config.save_to(&path).unwrap();
        assert_eq!(ClientConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn overrides_apply_when_valid() {
        let config = ClientConfig::default().with_overrides(Some(" http://override:1 "), Some("12"));
        assert_eq!(config.base_url, "http://override:1");
        assert_eq!(config.request_timeout_secs, 12);

        let untouched = ClientConfig::default().with_overrides(Some("   "), Some("zero"));
        assert_eq!(untouched, ClientConfig::default());
    }
}
