//! Registry client error types

use crate::ErrorKind;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegistryError {
    #[error("package not found: {package}@{}", .version.as_deref().unwrap_or("*"))]
    NotFound {
        package: String,
        version: Option<String>,
    },

    #[error("transient registry failure (HTTP {status}) for {url}")]
    Transient { status: u16, url: String },

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timeout for {url}")]
    Timeout { url: String },

    #[error("malformed registry response: {message}")]
    Malformed { message: String },

    #[error("rate limited: retry after {seconds} seconds")]
    RateLimited { seconds: u64 },

    #[error("unsupported ecosystem: {0}")]
    UnsupportedEcosystem(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl RegistryError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::NotFound { .. } => ErrorKind::NotFound,
            RegistryError::Transient { .. }
            | RegistryError::ConnectionFailed(_)
            | RegistryError::Timeout { .. }
            | RegistryError::RateLimited { .. } => ErrorKind::Transient,
            RegistryError::Malformed { .. } | RegistryError::InvalidUrl(_) => ErrorKind::Malformed,
            RegistryError::UnsupportedEcosystem(_) => ErrorKind::Unsupported,
        }
    }
}
