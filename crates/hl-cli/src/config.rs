//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use hl_sync::{ExternalStore, HttpStore};
use serde::{Deserialize, Serialize};

/// Default delay before an edit is saved.
const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Base URL of the external health store. Sync is off without it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,

    /// Bearer token for the external health store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_token: Option<String>,

    /// Milliseconds an edit waits before it is saved.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

const fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("external_url", &self.external_url)
            .field(
                "external_token",
                &self.external_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("debounce_ms", &self.debounce_ms)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("hl.db"),
            external_url: None,
            external_token: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (HL_*)
        figment = figment.merge(Env::prefixed("HL_"));

        figment.extract()
    }

    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// The configured external store, if both URL and token are set.
    pub fn external_store(&self) -> Result<Option<Arc<dyn ExternalStore>>> {
        let (Some(url), Some(token)) = (&self.external_url, &self.external_token) else {
            return Ok(None);
        };
        let store = HttpStore::new(url.as_str(), token.as_str())
            .context("failed to create external store client")?;
        Ok(Some(Arc::new(store)))
    }
}

/// Returns the platform-specific config directory for hl.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hl"))
}

/// Returns the platform-specific data directory for hl.
///
/// On Linux: `~/.local/share/hl`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("hl"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_hl() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "hl");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("hl.db"));
        assert_eq!(config.debounce(), Duration::from_millis(500));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = Config {
            external_url: Some("https://store.example".to_string()),
            external_token: Some("hunter2".to_string()),
            ..Config::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_external_store_needs_url_and_token() {
        let config = Config {
            external_url: Some("https://store.example".to_string()),
            ..Config::default()
        };
        assert!(config.external_store().unwrap().is_none());

        let config = Config {
            external_token: Some("t0k".to_string()),
            ..config
        };
        assert!(config.external_store().unwrap().is_some());
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "database_path = \"/tmp/other.db\"\ndebounce_ms = 0\n").unwrap();

        let config = Config::load_from(Some(&path)).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.debounce_ms, 0);
    }
}
