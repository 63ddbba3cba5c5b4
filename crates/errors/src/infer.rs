//! Strategy inference error types

use crate::ErrorKind;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InferError {
    #[error("no valid ref found for {package}@{version}")]
    NoValidRef { package: String, version: String },

    #[error("manifest not found for {package}")]
    ManifestNotFound { package: String },

    #[error("manifest name mismatch: expected {expected}, found {found}")]
    NameMismatch { expected: String, found: String },

    #[error("manifest parse failed at {path}: {message}")]
    ManifestParse { path: String, message: String },

    #[error("no repository URL recorded for {package}")]
    MissingRepo { package: String },

    #[error("tool version selection failed: {message}")]
    VersionPick { message: String },

    #[error("ecosystem not supported: {0}")]
    Unsupported(String),
}

impl InferError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            InferError::NoValidRef { .. } => ErrorKind::NoValidRef,
            InferError::ManifestNotFound { .. } | InferError::MissingRepo { .. } => {
                ErrorKind::NotFound
            }
            InferError::NameMismatch { .. }
            | InferError::ManifestParse { .. }
            | InferError::VersionPick { .. } => ErrorKind::Malformed,
            InferError::Unsupported(_) => ErrorKind::Unsupported,
        }
    }
}
