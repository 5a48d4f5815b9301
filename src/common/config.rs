//! Configuration loading with environment variable support
//!
//! File first, then `CHATPLAY_*` overrides, then validation. A failure here
//! is the only fatal startup condition.

use crate::config::BotConfig;
use crate::errors::{BotResult, ConfigurationError};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            config_path: None,
        }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> BotResult<BotConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => BotConfig::default(),
        };

        self.apply_env_overrides(&mut config)?;

        config
            .validate()
            .map_err(|e| ConfigurationError::ValidationFailed(e.to_string()))?;

        Ok(config)
    }

    /// Load configuration from TOML file
    fn load_from_file(&self, path: &Path) -> BotResult<BotConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, config: &mut BotConfig) -> BotResult<()> {
        if let Ok(channel) = env::var("CHATPLAY_CHANNEL") {
            config.channel.channel_name = channel;
        }
        if let Ok(broadcaster_id) = env::var("CHATPLAY_BROADCASTER_ID") {
            config.channel.broadcaster_id = broadcaster_id;
        }
        if let Ok(moderator_id) = env::var("CHATPLAY_MODERATOR_ID") {
            config.channel.moderator_id = moderator_id;
        }
        if let Ok(data_dir) = env::var("CHATPLAY_DATA_DIR") {
            config.storage.data_directory = PathBuf::from(data_dir);
        }
        if let Ok(level) = env::var("CHATPLAY_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(balance) = env::var("CHATPLAY_STARTING_BALANCE") {
            config.economy.starting_balance = balance.parse()
                .map_err(|_| ConfigurationError::InvalidValue {
                    field: "CHATPLAY_STARTING_BALANCE".to_string(),
                    value: balance,
                    reason: "Invalid balance".to_string(),
                })?;
        }
        if let Ok(timeout) = env::var("CHATPLAY_WAGER_TIMEOUT") {
            config.economy.wager_timeout_seconds = timeout.parse()
                .map_err(|_| ConfigurationError::InvalidValue {
                    field: "CHATPLAY_WAGER_TIMEOUT".to_string(),
                    value: timeout,
                    reason: "Invalid timeout value".to_string(),
                })?;
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &BotConfig, path: &Path) -> BotResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string).map_err(|e| {
            ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path.display(), e)).into()
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config(path: &Path) -> BotResult<()> {
    ConfigLoader::new().save(&BotConfig::production(), path)
}
