//! Shared registry metadata models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A package's repository pointer.
///
/// npm's legacy encoding allows the `repository` field to be either an
/// object or a bare string; [`RepositoryRef::deserialize`] tolerates
/// both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryRef {
    pub url: String,
    /// Subdirectory within the repository holding the package.
    pub directory: Option<String>,
}

impl RepositoryRef {
    /// Normalize VCS URL schemes down to something cloneable: strips a
    /// `git+` prefix and any fragment.
    #[must_use]
    pub fn normalized_url(&self) -> String {
        let url = self.url.trim_start_matches("git+");
        let url = url.split('#').next().unwrap_or(url);
        let url = url.replacen("git://", "https://", 1);
        url.to_string()
    }
}

impl<'de> Deserialize<'de> for RepositoryRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Legacy(String),
            Object {
                #[serde(default)]
                url: Option<String>,
                #[serde(default)]
                directory: Option<String>,
            },
        }

        match Raw::deserialize(deserializer)? {
            Raw::Legacy(url) => Ok(RepositoryRef {
                url,
                directory: None,
            }),
            Raw::Object { url, directory } => Ok(RepositoryRef {
                url: url.unwrap_or_default(),
                directory,
            }),
        }
    }
}

/// Package-level registry metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageMeta {
    pub name: String,
    /// All published version identifiers.
    pub versions: Vec<String>,
    /// Upload instant per version, where the registry exposes one.
    pub upload_times: BTreeMap<String, DateTime<Utc>>,
    /// Package-level repository pointer, when present.
    pub repository: Option<RepositoryRef>,
}

impl PackageMeta {
    /// Upload time of one version.
    #[must_use]
    pub fn upload_time(&self, version: &str) -> Option<DateTime<Utc>> {
        self.upload_times.get(version).copied()
    }
}

/// Version-level registry metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionMeta {
    /// Repository pointer recorded on the version, when present.
    pub repository: Option<RepositoryRef>,
    /// Integrity hash as published (`sha512-...` / hex sha256).
    pub integrity: Option<String>,
    /// URL of the artifact as served by the registry.
    pub dist_url: Option<String>,
    /// Commit id the publisher recorded (npm `gitHead`).
    pub git_ref: Option<String>,
    /// Build-tool versions declared at publish time, keyed by tool name
    /// (`npm`, `node`, `rust`, ...).
    pub tool_versions: BTreeMap<String, String>,
    /// The manifest's scripts map, for build-command detection.
    pub scripts: BTreeMap<String, String>,
    /// Upload instant of this version, when known.
    pub upload_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_tolerates_both_encodings() {
        let legacy: RepositoryRef =
            serde_json::from_str(r#""git+https://github.com/a/b.git""#).unwrap();
        assert_eq!(legacy.url, "git+https://github.com/a/b.git");
        assert_eq!(legacy.normalized_url(), "https://github.com/a/b.git");

        let object: RepositoryRef = serde_json::from_str(
            r#"{"type": "git", "url": "git://github.com/a/b.git", "directory": "packages/b"}"#,
        )
        .unwrap();
        assert_eq!(object.normalized_url(), "https://github.com/a/b.git");
        assert_eq!(object.directory.as_deref(), Some("packages/b"));
    }
}
