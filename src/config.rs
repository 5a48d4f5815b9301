//! Configuration management with validation and defaults
//!
//! One TOML document, one section per concern. Every timing constant of the
//! games lives here so tests can shrink them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Complete bot configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub channel: ChannelConfig,
    pub economy: EconomyConfig,
    pub roulette: RouletteConfig,
    pub giveaway: GiveawayConfig,
    pub cooldowns: CooldownConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub console: ConsoleConfig,
}

/// Channel identity and command syntax
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub channel_name: String,
    pub bot_nick: String,
    pub command_prefix: String,
    /// The identity that can never be penalized by the roulette game
    pub broadcaster_id: String,
    pub moderator_id: String,
    /// Offset used by the `time` command
    pub utc_offset_hours: i32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            channel_name: "urxi_".to_string(),
            bot_nick: "Urxi_".to_string(),
            command_prefix: "!".to_string(),
            broadcaster_id: "1034744882".to_string(),
            moderator_id: String::new(),
            utc_offset_hours: 7,
        }
    }
}

/// Currency and wager settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub starting_balance: u64,
    pub wager_timeout_seconds: u64,
    pub bet_cooldown_seconds: u64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_balance: 1000,
            wager_timeout_seconds: 30,
            bet_cooldown_seconds: 30,
        }
    }
}

/// Elimination game pacing and penalty
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RouletteConfig {
    pub chambers: u8,
    pub turn_delay_ms: u64,
    pub reveal_delay_ms: u64,
    pub penalty_seconds: u64,
    pub prop_source: String,
    pub prop_duration_ms: u64,
    pub penalty_reason: String,
    pub redirected_penalty_reason: String,
}

impl Default for RouletteConfig {
    fn default() -> Self {
        Self {
            chambers: 6,
            turn_delay_ms: 4_000,
            reveal_delay_ms: 10_000,
            penalty_seconds: 120,
            prop_source: "gun".to_string(),
            prop_duration_ms: 10_000,
            penalty_reason: "Lost in Russian Roulette game".to_string(),
            redirected_penalty_reason: "Lost in Russian Roulette game impossible to win".to_string(),
        }
    }
}

/// Giveaway presentation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GiveawayConfig {
    pub wheel_source: String,
    pub wheel_duration_ms: u64,
    /// Entries granted to privileged viewers
    pub privileged_weight: usize,
}

impl Default for GiveawayConfig {
    fn default() -> Self {
        Self {
            wheel_source: "wheel".to_string(),
            wheel_duration_ms: 20_000,
            privileged_weight: 2,
        }
    }
}

/// Per-user cooldowns for chatter commands and keyword triggers
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    pub keyword_seconds: u64,
    pub hit_seconds: u64,
    /// Message prefix -> counter name
    pub counter_triggers: HashMap<String, String>,
    /// Whole message -> counter name
    pub counter_exact_triggers: HashMap<String, String>,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        let mut counter_triggers = HashMap::new();
        counter_triggers.insert("คม".to_string(), "sharp".to_string());
        counter_triggers.insert("159743568".to_string(), "cute".to_string());
        let mut counter_exact_triggers = HashMap::new();
        counter_exact_triggers.insert("ns".to_string(), "sharp".to_string());
        Self {
            keyword_seconds: 10,
            hit_seconds: 10,
            counter_triggers,
            counter_exact_triggers,
        }
    }
}

/// Durable store locations
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub balances_file: String,
    pub entries_file: String,
    pub counters_file: String,
    pub commands_file: String,
    pub menu_file: String,
    pub bullet_file: String,
    pub winner_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from("./data"),
            balances_file: "money.json".to_string(),
            entries_file: "giveaway.json".to_string(),
            counters_file: "counters.json".to_string(),
            commands_file: "commands.json".to_string(),
            menu_file: "food.json".to_string(),
            bullet_file: "bullet.json".to_string(),
            winner_file: "winner.json".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn path_of(&self, file: &str) -> PathBuf {
        self.data_directory.join(file)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Human,
    Json,
}

/// Logging output
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
            file: None,
        }
    }
}

/// Local collaborators used by the console transport
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// login name -> user id
    pub directory: HashMap<String, String>,
    pub privileged_viewers: Vec<String>,
    pub moderators: Vec<String>,
    /// stream category name -> category id
    pub categories: HashMap<String, String>,
}

impl BotConfig {
    /// Configuration for live streams with on-disk stores under `./data`
    pub fn production() -> Self {
        Self {
            logging: LoggingConfig {
                file: Some(PathBuf::from("bot.log")),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Configuration with millisecond pacing for tests
    pub fn testing(data_directory: impl Into<PathBuf>) -> Self {
        Self {
            roulette: RouletteConfig {
                turn_delay_ms: 4,
                reveal_delay_ms: 10,
                prop_duration_ms: 10,
                ..Default::default()
            },
            giveaway: GiveawayConfig {
                wheel_duration_ms: 20,
                ..Default::default()
            },
            storage: StorageConfig {
                data_directory: data_directory.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.channel.broadcaster_id.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "channel.broadcaster_id".to_string()
            ));
        }

        if self.channel.command_prefix.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "channel.command_prefix".to_string()
            ));
        }

        if !(-12..=14).contains(&self.channel.utc_offset_hours) {
            return Err(ConfigValidationError::InvalidValue(
                "channel.utc_offset_hours must be within -12..=14".to_string()
            ));
        }

        if self.economy.starting_balance == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "economy.starting_balance must be > 0".to_string()
            ));
        }

        if self.economy.wager_timeout_seconds == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "economy.wager_timeout_seconds must be > 0".to_string()
            ));
        }

        if self.roulette.chambers == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "roulette.chambers must be > 0".to_string()
            ));
        }

        if self.roulette.turn_delay_ms == 0 || self.roulette.reveal_delay_ms == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "roulette turn and reveal delays must be > 0".to_string()
            ));
        }

        if self.roulette.penalty_seconds == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "roulette.penalty_seconds must be > 0".to_string()
            ));
        }

        if self.giveaway.privileged_weight == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "giveaway.privileged_weight must be > 0".to_string()
            ));
        }

        Ok(())
    }

    pub fn wager_timeout(&self) -> Duration {
        Duration::from_secs(self.economy.wager_timeout_seconds)
    }

    pub fn turn_delay(&self) -> Duration {
        Duration::from_millis(self.roulette.turn_delay_ms)
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.roulette.reveal_delay_ms)
    }

    pub fn penalty_duration(&self) -> Duration {
        Duration::from_secs(self.roulette.penalty_seconds)
    }

    pub fn prop_duration(&self) -> Duration {
        Duration::from_millis(self.roulette.prop_duration_ms)
    }

    pub fn wheel_duration(&self) -> Duration {
        Duration::from_millis(self.giveaway.wheel_duration_ms)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    InvalidValue(String),
    MissingRequired(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValidationError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
            ConfigValidationError::MissingRequired(msg) => write!(f, "Missing required configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BotConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(BotConfig::production().validate().is_ok());
        assert!(BotConfig::testing("/tmp/chatplay").validate().is_ok());
    }

    #[test]
    fn test_missing_broadcaster_is_rejected() {
        let mut config = BotConfig::default();
        config.channel.broadcaster_id = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_zero_chambers_is_rejected() {
        let mut config = BotConfig::default();
        config.roulette.chambers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_conversions() {
        let config = BotConfig::default();
        assert_eq!(config.wager_timeout(), Duration::from_secs(30));
        assert_eq!(config.turn_delay(), Duration::from_secs(4));
        assert_eq!(config.reveal_delay(), Duration::from_secs(10));
        assert_eq!(config.penalty_duration(), Duration::from_secs(120));
        assert_eq!(config.prop_duration(), Duration::from_secs(10));
        assert_eq!(config.wheel_duration(), Duration::from_secs(20));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: BotConfig = toml::from_str(
            r#"
            [economy]
            starting_balance = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.economy.starting_balance, 500);
        assert_eq!(config.economy.wager_timeout_seconds, 30);
        assert_eq!(config.roulette.chambers, 6);
    }
}
