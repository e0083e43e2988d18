use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
///
/// Read from `config.toml` in the platform config directory when present.
/// The file is never written; every field has a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub window: WindowConfig,
}

/// Periodic refresh settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between scheduled refresh cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

fn default_interval_secs() -> u64 {
    60 * 60
}

/// External address lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// IP-echo endpoint answering `{"ip": "..."}`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LookupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn default_endpoint() -> String {
    "https://api.ipify.org?format=json".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

/// Window behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Start with only the tray icon visible
    #[serde(default = "default_true")]
    pub start_hidden: bool,
    /// Keep the window above other windows
    #[serde(default = "default_true")]
    pub always_on_top: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start_hidden: true,
            always_on_top: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "ucips", "UCIPS")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from the platform config directory
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file, using defaults if it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            tracing::info!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.refresh.interval(), Duration::from_secs(3600));
        assert_eq!(config.lookup.endpoint, "https://api.ipify.org?format=json");
        assert_eq!(config.lookup.timeout(), Duration::from_secs(5));
        assert!(config.window.start_hidden);
        assert!(config.window.always_on_top);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.refresh.interval_secs, 3600);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[refresh]\ninterval_secs = 600\n\n[window]\nstart_hidden = false\n")
            .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.refresh.interval(), Duration::from_secs(600));
        assert!(!config.window.start_hidden);
        // Untouched sections keep their defaults
        assert!(config.window.always_on_top);
        assert_eq!(config.lookup.timeout_secs, 5);
    }

    #[test]
    fn test_zero_durations_are_clamped() {
        let config: Config =
            toml::from_str("[refresh]\ninterval_secs = 0\n[lookup]\ntimeout_secs = 0\n").unwrap();
        assert_eq!(config.refresh.interval(), Duration::from_secs(1));
        assert_eq!(config.lookup.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "refresh = [not toml").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
