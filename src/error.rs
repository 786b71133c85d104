//! Error types for the workshop bot.

use crate::model::Identity;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence errors. Reading a missing registry file is *not* an error
/// (the schema contract treats it as an empty collection); anything else
/// surfaces here instead of being swallowed.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt registry file {file}: {reason}")]
    Corrupt { file: String, reason: String },
}

/// User/pending registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("User {0} not found")]
    UserNotFound(Identity),

    #[error("No pending registration for user {0}")]
    PendingNotFound(Identity),

    #[error("The system administrator record cannot be modified")]
    SystemAdminImmutable,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Order lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order {0} not found")]
    NotFound(i64),

    #[error("Order {0} already has start evidence")]
    AlreadyStarted(i64),

    #[error("Order {0} has no start evidence yet")]
    NotStarted(i64),

    #[error("Order {0} is completed and immutable")]
    Completed(i64),

    #[error("Owner {0} is not an approved account")]
    UnknownOwner(Identity),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Channel/transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
