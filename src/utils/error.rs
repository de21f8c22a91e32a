//! Error types for diskplan

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiskplanError {
    #[error("No disks found in the structural feed")]
    NoDisks,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Structural feed error: {0}")]
    FeedError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User cancelled operation")]
    UserCancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, DiskplanError>;
