//! Build target identity

use rebuildr_errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported package ecosystems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Npm,
    #[serde(rename = "pypi")]
    PyPI,
    #[serde(rename = "cratesio")]
    CratesIO,
    Debian,
    Maven,
    Go,
}

impl Ecosystem {
    /// All ecosystems, in registry rate-limiter order
    #[must_use]
    pub fn all() -> &'static [Ecosystem] {
        &[
            Ecosystem::Npm,
            Ecosystem::PyPI,
            Ecosystem::CratesIO,
            Ecosystem::Debian,
            Ecosystem::Maven,
            Ecosystem::Go,
        ]
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Npm => "npm",
            Self::PyPI => "pypi",
            Self::CratesIO => "cratesio",
            Self::Debian => "debian",
            Self::Maven => "maven",
            Self::Go => "go",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Ecosystem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "npm" => Ok(Self::Npm),
            "pypi" => Ok(Self::PyPI),
            "cratesio" | "crates.io" => Ok(Self::CratesIO),
            "debian" => Ok(Self::Debian),
            "maven" => Ok(Self::Maven),
            "go" => Ok(Self::Go),
            other => Err(rebuildr_errors::RegistryError::UnsupportedEcosystem(
                other.to_string(),
            )
            .into()),
        }
    }
}

/// Unique identity of one build attempt.
///
/// `artifact` may be empty at entry; the ecosystem rebuilder fills it in
/// exactly once and it never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub ecosystem: Ecosystem,
    pub package: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

impl Target {
    /// Create a new target
    ///
    /// # Errors
    ///
    /// Returns an error if `package` or `version` is empty.
    pub fn new(
        ecosystem: Ecosystem,
        package: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self> {
        let package = package.into();
        let version = version.into();
        if package.is_empty() {
            return Err(Error::internal("target package must be non-empty"));
        }
        if version.is_empty() {
            return Err(Error::internal("target version must be non-empty"));
        }
        Ok(Self {
            ecosystem,
            package,
            version,
            artifact: None,
        })
    }

    /// Set the artifact name.
    ///
    /// # Errors
    ///
    /// Returns an error if a different artifact name was already set; the
    /// artifact is immutable once chosen.
    pub fn set_artifact(&mut self, artifact: impl Into<String>) -> Result<()> {
        let artifact = artifact.into();
        match &self.artifact {
            Some(existing) if *existing != artifact => Err(Error::internal(format!(
                "artifact already set to {existing}, refusing {artifact}"
            ))),
            _ => {
                self.artifact = Some(artifact);
                Ok(())
            }
        }
    }

    /// The artifact name, or empty when not yet guessed.
    #[must_use]
    pub fn artifact_name(&self) -> &str {
        self.artifact.as_deref().unwrap_or("")
    }

    /// Filesystem-safe encoding of this target, used by the asset store.
    ///
    /// `/` becomes `!` and `@` is stripped, so scoped npm names stay
    /// one path component.
    #[must_use]
    pub fn encoded(&self) -> String {
        let raw = format!(
            "{}/{}/{}/{}",
            self.ecosystem,
            self.package,
            self.version,
            self.artifact_name()
        );
        raw.replace('/', "!").replace('@', "")
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.ecosystem, self.package, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_requires_package_and_version() {
        assert!(Target::new(Ecosystem::Npm, "", "1.0.0").is_err());
        assert!(Target::new(Ecosystem::Npm, "left-pad", "").is_err());
        assert!(Target::new(Ecosystem::Npm, "left-pad", "1.3.0").is_ok());
    }

    #[test]
    fn artifact_set_once() {
        let mut t = Target::new(Ecosystem::Npm, "left-pad", "1.3.0").unwrap();
        t.set_artifact("left-pad-1.3.0.tgz").unwrap();
        // setting the same value again is fine
        t.set_artifact("left-pad-1.3.0.tgz").unwrap();
        assert!(t.set_artifact("other.tgz").is_err());
    }

    #[test]
    fn encoded_is_filesystem_safe() {
        let mut t = Target::new(Ecosystem::Npm, "@scope/pkg", "1.0.0").unwrap();
        t.set_artifact("scope-pkg-1.0.0.tgz").unwrap();
        assert_eq!(t.encoded(), "npm!scope!pkg!1.0.0!scope-pkg-1.0.0.tgz");
    }

    #[test]
    fn ecosystem_round_trip() {
        for eco in Ecosystem::all() {
            let parsed: Ecosystem = eco.to_string().parse().unwrap();
            assert_eq!(parsed, *eco);
        }
    }
}
