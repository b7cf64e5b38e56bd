//! Configuration file parser for ~/.config/news-digest/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted with a warning.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::api::Latency;
use crate::router::DEFAULT_TITLE;
use crate::stores::DEFAULT_SESSION_KEY;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Articles per page.
    pub page_size: u32,

    /// Simulated backend latency in milliseconds. 0 disables the delay.
    pub latency_ms: u64,

    /// Document title for routes without their own.
    pub app_title: String,

    /// Storage key of the persisted session.
    pub session_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: crate::stores::DEFAULT_PAGE_SIZE,
            latency_ms: 0,
            app_title: DEFAULT_TITLE.to_string(),
            session_key: DEFAULT_SESSION_KEY.to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 4] = ["page_size", "latency_ms", "app_title", "session_key"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - `page_size = 0` or an empty `session_key` → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::parse(&content)?;
        tracing::info!(
            path = %path.display(),
            page_size = config.page_size,
            latency_ms = config.latency_ms,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".to_string()));
        }
        if self.session_key.trim().is_empty() {
            return Err(ConfigError::Invalid("session_key must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn latency(&self) -> Latency {
        Latency::from_millis(self.latency_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================
