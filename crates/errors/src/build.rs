//! Build execution error types

use crate::ErrorKind;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BuildError {
    #[error("build step `{step}` exited with status {code}")]
    StepFailed { step: String, code: i32 },

    #[error("build step `{step}` terminated by signal")]
    StepKilled { step: String },

    #[error("expected artifact missing at {path}")]
    MissingArtifact { path: String },

    #[error("build timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("instruction rendering failed: {message}")]
    Render { message: String },

    #[error("builder unavailable: {message}")]
    Unavailable { message: String },
}

impl BuildError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::StepFailed { .. }
            | BuildError::StepKilled { .. }
            | BuildError::MissingArtifact { .. }
            | BuildError::Timeout { .. } => ErrorKind::BuildFailure,
            BuildError::Render { .. } => ErrorKind::Internal,
            BuildError::Unavailable { .. } => ErrorKind::Transient,
        }
    }
}
