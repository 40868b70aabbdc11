//! Configuration - YAML file with environment variable overrides

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    APP_DIR_NAME, AUTOSAVE_DELAY_MS, DEFAULT_API_URL, DEFAULT_LOG_FILE, QUERY_SYNC_DELAY_MS,
    REQUEST_TIMEOUT_SECS,
};
use crate::error::{Error, Result};

/// Overrides `api_url`
pub const ENV_API_URL: &str = "COURIER_API_URL";
/// Overrides `token`
pub const ENV_TOKEN: &str = "COURIER_TOKEN";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend base URL (store and proxy)
    pub api_url: String,
    /// Bearer token for the backend
    pub token: Option<String>,
    pub request_timeout_secs: u64,
    pub autosave_delay_ms: u64,
    pub query_sync_delay_ms: u64,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: String::from(DEFAULT_API_URL),
            token: None,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            autosave_delay_ms: AUTOSAVE_DELAY_MS,
            query_sync_delay_ms: QUERY_SYNC_DELAY_MS,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl Config {
    /// `<config dir>/courier/config.yaml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
            .join("config.yaml")
    }

    /// Load from the default path, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::from_file(&Self::default_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// A missing file yields the defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.is_empty()) {
            self.token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_url)
            .map_err(|e| Error::config(format!("api_url '{}': {}", self.api_url, e)))?;
        if self.request_timeout_secs == 0 {
            return Err(Error::config("request_timeout_secs must be positive"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub fn query_sync_delay(&self) -> Duration {
        Duration::from_millis(self.query_sync_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::from_file(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.autosave_delay(), Duration::from_millis(1000));
        assert_eq!(config.query_sync_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "api_url: https://backend.test/api\ntoken: abc\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.api_url, "https://backend.test/api");
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.request_timeout_secs, REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            ENV_API_URL => Some("https://other.test".into()),
            ENV_TOKEN => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.api_url, "https://other.test");
        assert_eq!(config.token, None);
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = Config {
            api_url: "not a url".into(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }
}
