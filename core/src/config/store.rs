//! Configuration Store
//!
//! Loading/saving the TOML config file and applying overrides.

use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::endpoint::{derive_channel_url, DEFAULT_BACKEND_URL, DEFAULT_CHAT_PATH};
use crate::error::{DevpaneError, Result};

/// Environment variable that overrides `backend_url`
pub const BACKEND_URL_ENV: &str = "BACKEND_URL";

/// devpane configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP(S) base address of the backend
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Path of the chat channel under the base address
    #[serde(default = "default_chat_path")]
    pub chat_path: String,

    /// Timeout for `probe` requests, in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Chat pane presentation
    #[serde(default)]
    pub ui: UiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            chat_path: default_chat_path(),
            probe_timeout_secs: default_probe_timeout(),
            ui: UiConfig::default(),
        }
    }
}

/// Chat pane settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiConfig {
    /// Prefix every message with its role label
    #[serde(default = "default_true")]
    pub show_roles: bool,

    /// Label for messages typed locally
    #[serde(default = "default_local_label")]
    pub local_label: String,

    /// Label for messages from the backend
    #[serde(default = "default_remote_label")]
    pub remote_label: String,

    /// Colour output (ignored when stdout is not a terminal)
    #[serde(default = "default_true")]
    pub color: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_roles: true,
            local_label: default_local_label(),
            remote_label: default_remote_label(),
            color: true,
        }
    }
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_chat_path() -> String {
    DEFAULT_CHAT_PATH.to_string()
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_local_label() -> String {
    "user".to_string()
}

fn default_remote_label() -> String {
    "assistant".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DevpaneError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> Option<PathBuf> {
        super::get_config_dir().map(|d| d.join("config.toml"))
    }

    /// Load the first config file found, or defaults.
    ///
    /// A file that exists but cannot be parsed is reported and skipped.
    pub fn load_or_default() -> Self {
        if let Some(path) = super::find_config_file() {
            match Self::load(&path) {
                Ok(config) => {
                    debug!(path = %path.display(), "loaded config");
                    return config;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable config"),
            }
        }
        Self::default()
    }

    /// Apply the `BACKEND_URL` environment variable
    pub fn with_env_overrides(self) -> Self {
        let from_env = std::env::var(BACKEND_URL_ENV).ok();
        self.with_backend_override(from_env)
    }

    /// Replace `backend_url` when `backend_url` is a non-blank value
    pub fn with_backend_override(mut self, backend_url: Option<String>) -> Self {
        if let Some(url) = backend_url.filter(|u| !u.trim().is_empty()) {
            self.backend_url = url.trim().to_string();
        }
        self
    }

    /// Channel address the chat session will connect to
    pub fn channel_url(&self) -> Result<Url> {
        derive_channel_url(&self.backend_url, &self.chat_path)
    }

    /// Check that the configuration can produce a working session
    pub fn validate(&self) -> Result<()> {
        if !self.chat_path.starts_with('/') {
            return Err(DevpaneError::InvalidConfig {
                message: format!("chat_path must start with '/', got '{}'", self.chat_path),
            });
        }
        if self.probe_timeout_secs == 0 {
            return Err(DevpaneError::InvalidConfig {
                message: "probe_timeout_secs must be positive".to_string(),
            });
        }
        self.channel_url().map_err(|e| DevpaneError::InvalidConfig {
            message: format!("backend_url: {e}"),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend_url, "http://localhost:8000");
        assert_eq!(config.chat_path, "/ws/chat");
        assert!(config.ui.show_roles);
        assert_eq!(config.channel_url().unwrap().as_str(), "ws://localhost:8000/ws/chat");
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
backend_url = "https://ops.example.com"

[ui]
remote_label = "ai"
"#,
        )
        .unwrap();
        assert_eq!(config.backend_url, "https://ops.example.com");
        assert_eq!(config.chat_path, "/ws/chat");
        assert_eq!(config.ui.remote_label, "ai");
        assert_eq!(config.ui.local_label, "user");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devpane").join("config.toml");

        let mut config = Config::default();
        config.backend_url = "http://10.1.2.3:9000".to_string();
        config.ui.color = false;
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, DevpaneError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "backend_url = [").unwrap();
        assert!(matches!(Config::load(&path), Err(DevpaneError::TomlParse(_))));
    }

    #[test]
    fn test_backend_override() {
        let config = Config::default().with_backend_override(Some(" https://prod:443 ".to_string()));
        assert_eq!(config.backend_url, "https://prod:443");

        let config = Config::default().with_backend_override(Some("   ".to_string()));
        assert_eq!(config.backend_url, "http://localhost:8000");

        let config = Config::default().with_backend_override(None);
        assert_eq!(config.backend_url, "http://localhost:8000");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            chat_path: "ws/chat".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(DevpaneError::InvalidConfig { .. })));

        let config = Config {
            backend_url: "localhost:8000".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(DevpaneError::InvalidConfig { .. })));
    }
}
