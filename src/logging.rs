//! Structured logging setup
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to the
//! `chatplay` targets only. Logs go to stderr so stdout stays free for chat
//! output, and are optionally mirrored to a file.

use crate::config::{LogFormat, LoggingConfig};
use crate::errors::{BotResult, ConfigurationError, StorageError};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

/// Install the global subscriber described by `config`
pub fn init(config: &LoggingConfig) -> BotResult<()> {
    let filter = build_filter(&config.level)?;

    let console_layer = match config.format {
        LogFormat::Human => fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let file_layer = match &config.file {
        Some(path) => {
            let file = open_log_file(path)?;
            let layer = match config.format {
                LogFormat::Human => fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file))
                    .boxed(),
                LogFormat::Json => fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(Mutex::new(file))
                    .boxed(),
            };
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to install log subscriber: {}", e)))?;

    Ok(())
}

/// `RUST_LOG` if present, else `chatplay=<level>`
pub fn build_filter(level: &str) -> BotResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(format!("chatplay={}", level)).map_err(|e| {
        ConfigurationError::InvalidValue {
            field: "logging.level".to_string(),
            value: level.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn open_log_file(path: &Path) -> BotResult<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StorageError::WriteFailed(format!("Cannot open log file {}: {}", path.display(), e)).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_level_filter_is_scoped_to_crate() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let filter = build_filter("debug").unwrap();
        assert_eq!(filter.to_string(), "chatplay=debug");
    }

    #[test]
    fn test_open_log_file_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("bot.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }
}
