//! Configuration error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("config parse failed: {message}")]
    ParseError { message: String },

    #[error("invalid config value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
