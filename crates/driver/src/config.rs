//! Driver configuration management

use crate::led::{CachePolicy, Caller, LedController};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default)]
    pub driver: DriverSettings,
    #[serde(default)]
    pub transfer: TransferSettings,
    #[serde(default)]
    pub console: ConsoleSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverSettings {
    #[serde(default = "DriverSettings::default_log_level")]
    pub log_level: String,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

impl DriverSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

/// Bulk transfer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Bulk OUT timeout in seconds
    #[serde(default = "TransferSettings::default_timeout_secs")]
    pub timeout_secs: u64,
    /// Cached state handling when a transfer fails (optimistic, fail-closed)
    #[serde(default)]
    pub cache_policy: CachePolicy,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout_secs(),
            cache_policy: CachePolicy::default(),
        }
    }
}

impl TransferSettings {
    fn default_timeout_secs() -> u64 {
        100
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Daemon console settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleSettings {
    /// Console commands act as an unprivileged caller (reads only)
    #[serde(default)]
    pub read_only: bool,
}

impl ConsoleSettings {
    pub fn caller(&self) -> Caller {
        if self.read_only {
            Caller::Other
        } else {
            Caller::Owner
        }
    }
}

impl DriverConfig {
    /// Load configuration from the specified path
    ///
    /// Without a path, the first existing standard location is used and it is
    /// an error if there is none.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            Self::candidate_paths()
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: DriverConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration from a user-supplied path, expanding `~`
    pub fn load_expanded(path: &str) -> Result<Self> {
        let path_buf = PathBuf::from(shellexpand::tilde(path).as_ref());
        Self::load(Some(path_buf))
    }

    /// Load configuration from the standard locations, or defaults if none exists
    ///
    /// A file that exists but cannot be read, parsed or validated is an
    /// error, never replaced by defaults.
    pub fn load_or_default() -> Result<Self> {
        Self::load_first_or_default(&Self::candidate_paths())
    }

    /// Load the first existing file among `candidates`, or defaults if none exists
    pub fn load_first_or_default(candidates: &[PathBuf]) -> Result<Self> {
        match candidates.iter().find(|p| p.exists()) {
            Some(path) => Self::load(Some(path.clone())),
            None => Ok(Self::default()),
        }
    }

    /// Standard configuration locations, in search order
    pub fn candidate_paths() -> Vec<PathBuf> {
        vec![
            Self::default_path(),
            PathBuf::from("/etc/usb-led/driver.toml"),
        ]
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usb-led").join("driver.toml")
        } else {
            PathBuf::from(".config/usb-led/driver.toml")
        }
    }

    /// LED controller built from the transfer settings
    pub fn controller(&self) -> LedController {
        LedController::new(self.transfer.timeout(), self.transfer.cache_policy)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.driver.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.driver.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.transfer.timeout_secs == 0 {
            return Err(anyhow!("Transfer timeout must be greater than 0"));
        }

        Ok(())
    }
}
