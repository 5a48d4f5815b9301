//! Error types for the chat game & economy engine
//!
//! Nested per-concern errors with a single root type so storage, ledger and
//! collaborator failures can flow through `?` up to the command boundary.

use std::fmt;
use std::error::Error as StdError;

/// Root error type for all engine operations
#[derive(Debug)]
pub enum BotError {
    /// Configuration related errors
    Configuration(ConfigurationError),

    /// Durable store errors
    Storage(StorageError),

    /// Balance ledger errors
    Ledger(LedgerError),

    /// Failures reported by external collaborators
    External(ExternalError),
}

/// Configuration and validation errors
#[derive(Debug)]
pub enum ConfigurationError {
    ValidationFailed(String),
    MissingRequired(String),
    InvalidValue { field: String, value: String, reason: String },
    LoadFailed(String),
    SaveFailed(String),
}

/// Durable store errors
#[derive(Debug)]
pub enum StorageError {
    ReadFailed(String),
    WriteFailed(String),
    CorruptedData(String),
    PermissionDenied(String),
}

/// Ledger errors
#[derive(Debug, PartialEq, Eq)]
pub enum LedgerError {
    InvalidAmount(u64),
    InsufficientFunds { user_id: String, balance: u64, requested: u64 },
    Overflow { user_id: String },
}

/// External collaborator errors
#[derive(Debug)]
pub enum ExternalError {
    RequestFailed { service: String, message: String },
    NotConnected(String),
}

impl fmt::Display for BotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotError::Configuration(e) => write!(f, "Configuration error: {}", e),
            BotError::Storage(e) => write!(f, "Storage error: {}", e),
            BotError::Ledger(e) => write!(f, "Ledger error: {}", e),
            BotError::External(e) => write!(f, "External service error: {}", e),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::ValidationFailed(msg) => write!(f, "Validation failed: {}", msg),
            ConfigurationError::MissingRequired(field) => write!(f, "Missing required field: {}", field),
            ConfigurationError::InvalidValue { field, value, reason } => {
                write!(f, "Invalid value for {}: '{}' ({})", field, value, reason)
            }
            ConfigurationError::LoadFailed(msg) => write!(f, "Failed to load configuration: {}", msg),
            ConfigurationError::SaveFailed(msg) => write!(f, "Failed to save configuration: {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ReadFailed(msg) => write!(f, "Read failed: {}", msg),
            StorageError::WriteFailed(msg) => write!(f, "Write failed: {}", msg),
            StorageError::CorruptedData(msg) => write!(f, "Corrupted data: {}", msg),
            StorageError::PermissionDenied(path) => write!(f, "Permission denied: {}", path),
        }
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::InvalidAmount(amount) => write!(f, "Invalid amount: {}", amount),
            LedgerError::InsufficientFunds { user_id, balance, requested } => {
                write!(f, "Insufficient funds for {}: balance {}, requested {}", user_id, balance, requested)
            }
            LedgerError::Overflow { user_id } => write!(f, "Balance overflow for {}", user_id),
        }
    }
}

impl fmt::Display for ExternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalError::RequestFailed { service, message } => {
                write!(f, "{} request failed: {}", service, message)
            }
            ExternalError::NotConnected(service) => write!(f, "{} is not connected", service),
        }
    }
}

impl StdError for BotError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            BotError::Configuration(e) => Some(e),
            BotError::Storage(e) => Some(e),
            BotError::Ledger(e) => Some(e),
            BotError::External(e) => Some(e),
        }
    }
}

impl StdError for ConfigurationError {}
impl StdError for StorageError {}
impl StdError for LedgerError {}
impl StdError for ExternalError {}

impl From<ConfigurationError> for BotError {
    fn from(e: ConfigurationError) -> Self {
        BotError::Configuration(e)
    }
}

impl From<StorageError> for BotError {
    fn from(e: StorageError) -> Self {
        BotError::Storage(e)
    }
}

impl From<LedgerError> for BotError {
    fn from(e: LedgerError) -> Self {
        BotError::Ledger(e)
    }
}

impl From<ExternalError> for BotError {
    fn from(e: ExternalError) -> Self {
        BotError::External(e)
    }
}

impl From<std::io::Error> for BotError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                BotError::Storage(StorageError::PermissionDenied(e.to_string()))
            }
            _ => BotError::Storage(StorageError::WriteFailed(e.to_string())),
        }
    }
}

impl From<serde_json::Error> for BotError {
    fn from(e: serde_json::Error) -> Self {
        BotError::Storage(StorageError::CorruptedData(e.to_string()))
    }
}

// Convenience type alias for Results
pub type BotResult<T> = Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let config_error = ConfigurationError::ValidationFailed("test".to_string());
        let bot_error = BotError::Configuration(config_error);

        assert!(bot_error.to_string().contains("Configuration error"));
        assert!(bot_error.to_string().contains("test"));
    }

    #[test]
    fn test_ledger_error_details() {
        let err = LedgerError::InsufficientFunds {
            user_id: "1000".to_string(),
            balance: 50,
            requested: 100,
        };

        assert!(err.to_string().contains("balance 50"));
        assert!(err.to_string().contains("requested 100"));
    }

    #[test]
    fn test_error_conversion() {
        let bot_error: BotError = LedgerError::InvalidAmount(0).into();

        match bot_error {
            BotError::Ledger(LedgerError::InvalidAmount(0)) => {}
            _ => panic!("Expected ledger error"),
        }
    }

    #[test]
    fn test_io_permission_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let bot_error: BotError = io.into();
        assert!(matches!(bot_error, BotError::Storage(StorageError::PermissionDenied(_))));
        assert!(bot_error.source().is_some());
    }
}
