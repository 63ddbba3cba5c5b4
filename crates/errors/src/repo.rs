//! Repository access error types

use crate::ErrorKind;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RepoError {
    #[error("clone failed for {url}: {message}")]
    CloneFailed { url: String, message: String },

    #[error("fetch failed for {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("path not found in tree: {0}")]
    PathNotFound(String),

    #[error("tag not found: {0}")]
    TagNotFound(String),

    #[error("git operation failed: {0}")]
    Git(String),

    #[error("invalid repository URL: {0}")]
    InvalidUrl(String),
}

impl RepoError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepoError::CloneFailed { .. } | RepoError::FetchFailed { .. } => ErrorKind::Transient,
            RepoError::RefNotFound(_) | RepoError::PathNotFound(_) | RepoError::TagNotFound(_) => {
                ErrorKind::NotFound
            }
            RepoError::InvalidUrl(_) => ErrorKind::Malformed,
            RepoError::Git(_) => ErrorKind::Internal,
        }
    }
}
