//! Asset store and rundex error types

use crate::ErrorKind;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StorageError {
    #[error("asset not found: {path}")]
    NotFound { path: String },

    #[error("I/O error: {message}")]
    IoError { message: String },

    #[error("corrupted record: {message}")]
    CorruptedData { message: String },
}

impl StorageError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::IoError { .. } => ErrorKind::Io,
            StorageError::CorruptedData { .. } => ErrorKind::Malformed,
        }
    }
}
