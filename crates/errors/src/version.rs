//! Version parsing error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VersionError {
    #[error("invalid semver: {input}")]
    InvalidSemver { input: String },
}
