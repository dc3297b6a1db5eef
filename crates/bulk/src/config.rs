//! Session configuration management

use crate::session::{DEFAULT_INITIAL_CAPACITY, DEFAULT_TIMEOUT};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables for a [`BulkSession`](crate::BulkSession)
///
/// # Example Configuration
/// ```toml
/// initial_capacity = 32
/// event_wait_ms = 500      # omit to wait indefinitely
/// default_timeout_ms = 2000
/// log_level = "debug"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Slots allocated when the session is created
    #[serde(default = "SessionConfig::default_initial_capacity")]
    pub initial_capacity: usize,
    /// Upper bound on a single event-processing wait, in milliseconds
    #[serde(default)]
    pub event_wait_ms: Option<u64>,
    /// Timeout applied by callers that do not pick their own
    #[serde(default = "SessionConfig::default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Default filter for [`init_logging`](SessionConfig::init_logging)
    #[serde(default = "SessionConfig::default_log_level")]
    pub log_level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_capacity: Self::default_initial_capacity(),
            event_wait_ms: None,
            default_timeout_ms: Self::default_timeout_ms(),
            log_level: Self::default_log_level(),
        }
    }
}

impl SessionConfig {
    fn default_initial_capacity() -> usize {
        DEFAULT_INITIAL_CAPACITY
    }

    fn default_timeout_ms() -> u64 {
        DEFAULT_TIMEOUT.as_millis() as u64
    }

    fn default_log_level() -> String {
        "info".to_string()
    }

    pub fn event_wait(&self) -> Option<Duration> {
        self.event_wait_ms.map(Duration::from_millis)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Install the tracing subscriber at the configured `log_level`
    ///
    /// `RUST_LOG` still takes precedence when set.
    pub fn init_logging(&self) -> crate::Result<()> {
        crate::logging::setup_logging(&self.log_level)
    }

    /// Load configuration from `path`, or from the default location
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => {
                let default = Self::default_path();
                if !default.exists() {
                    return Err(anyhow!(
                        "No configuration file found at {}",
                        default.display()
                    ));
                }
                default
            }
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SessionConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or fall back to defaults
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
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
            config_dir.join("usb-bulk").join("session.toml")
        } else {
            PathBuf::from(".config/usb-bulk/session.toml")
        }
    }

    fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.initial_capacity == 0 {
            return Err(anyhow!("initial_capacity must be greater than 0"));
        }

        if self.event_wait_ms == Some(0) {
            return Err(anyhow!(
                "event_wait_ms must be greater than 0 (omit it to wait indefinitely)"
            ));
        }

        Ok(())
    }
}
