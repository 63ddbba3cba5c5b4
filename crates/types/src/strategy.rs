//! Build strategies
//!
//! A `Strategy` is the minimal machine-checkable description of how to
//! rebuild a target: where the source lives and the ecosystem inputs the
//! build needs. Variants are plain data; rendering to shell scripts lives
//! in [`crate::instructions`].

use chrono::{DateTime, Utc};
use rebuildr_errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a package's source lives: VCS URL, immutable commit, and the
/// subdirectory holding the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub repo: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub dir: String,
}

impl Location {
    /// Create a location.
    ///
    /// # Errors
    ///
    /// Returns an error if a ref is given without a repo.
    pub fn new(
        repo: impl Into<String>,
        git_ref: impl Into<String>,
        dir: impl Into<String>,
    ) -> Result<Self> {
        let repo = repo.into();
        let git_ref = git_ref.into();
        if !git_ref.is_empty() && repo.is_empty() {
            return Err(Error::internal("location ref set without repo"));
        }
        Ok(Self {
            repo,
            git_ref,
            dir: dir.into(),
        })
    }
}

/// One step of a generic workflow strategy.
///
/// Either `uses` names a step kind the renderer understands
/// (`git-checkout`, `npm/install-node`, `npm/npx`) with `with`
/// parameters, or `runs` carries a raw shell fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub with: BTreeMap<String, String>,
}

/// The tagged union of per-ecosystem rebuild descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Strategy {
    /// Plain `npm pack` of a checked-out tree.
    NpmPackBuild {
        location: Location,
        npm_version: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version_override: Option<String>,
    },

    /// `npm install` plus a build script before packing.
    NpmCustomBuild {
        location: Location,
        npm_version: String,
        node_version: String,
        /// Script to run via `npm run` before packing, when present.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        command: Option<String>,
        /// Upload instant used to pin the timewarp registry.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        registry_time: Option<DateTime<Utc>>,
        /// Remove node_modules before `npm pack`.
        #[serde(default)]
        prepack_remove_deps: bool,
        /// Pack from the repository root rather than the package dir.
        #[serde(default)]
        keep_root: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version_override: Option<String>,
    },

    /// Build a pure (py3-none-any) wheel.
    PypiPureWheelBuild {
        location: Location,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        requirements: Vec<String>,
    },

    /// `cargo package` at a pinned toolchain.
    CratesioCargoPackage {
        location: Location,
        rust_version: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pre_commands: Vec<String>,
    },

    /// Rebuild from a Debian source package.
    DebianPackage {
        dsc_url: String,
        /// Native packages carry no Debian revision and no diff.
        #[serde(default)]
        native: bool,
    },

    /// `mvn package` at a pinned JDK.
    MavenBuild { location: Location, jdk_version: String },

    /// Deterministic module zip of the checkout.
    GoModuleBuild { location: Location, go_version: String },

    /// Generic step list, the representation the recovery loop emits.
    Workflow {
        location: Location,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        source_steps: Vec<FlowStep>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        deps_steps: Vec<FlowStep>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        build_steps: Vec<FlowStep>,
        output_dir: String,
    },

    /// Forces a location but triggers normal inference.
    LocationHint { location: Location },
}

impl Strategy {
    /// The source location, when the variant carries one.
    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        match self {
            Strategy::NpmPackBuild { location, .. }
            | Strategy::NpmCustomBuild { location, .. }
            | Strategy::PypiPureWheelBuild { location, .. }
            | Strategy::CratesioCargoPackage { location, .. }
            | Strategy::MavenBuild { location, .. }
            | Strategy::GoModuleBuild { location, .. }
            | Strategy::Workflow { location, .. }
            | Strategy::LocationHint { location } => Some(location),
            Strategy::DebianPackage { .. } => None,
        }
    }

    /// The manifest version patch, when one was inferred.
    #[must_use]
    pub fn version_override(&self) -> Option<&str> {
        match self {
            Strategy::NpmPackBuild {
                version_override, ..
            }
            | Strategy::NpmCustomBuild {
                version_override, ..
            } => version_override.as_deref(),
            _ => None,
        }
    }

    /// Whether this variant is a pre-inference hint rather than a
    /// buildable strategy.
    #[must_use]
    pub fn is_hint(&self) -> bool {
        matches!(self, Strategy::LocationHint { .. })
    }

    /// Stable name of the variant, used in build-info assets and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Strategy::NpmPackBuild { .. } => "npm_pack_build",
            Strategy::NpmCustomBuild { .. } => "npm_custom_build",
            Strategy::PypiPureWheelBuild { .. } => "pypi_pure_wheel_build",
            Strategy::CratesioCargoPackage { .. } => "cratesio_cargo_package",
            Strategy::DebianPackage { .. } => "debian_package",
            Strategy::MavenBuild { .. } => "maven_build",
            Strategy::GoModuleBuild { .. } => "go_module_build",
            Strategy::Workflow { .. } => "workflow",
            Strategy::LocationHint { .. } => "location_hint",
        }
    }

    /// Serialize to the YAML build-definition form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yml::to_string(self).map_err(|e| Error::internal(format!("strategy yaml: {e}")))
    }

    /// Parse the YAML build-definition form.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not describe a strategy.
    pub fn from_yaml(doc: &str) -> Result<Self> {
        serde_yml::from_str(doc).map_err(|e| Error::internal(format!("strategy yaml: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_ref_requires_repo() {
        assert!(Location::new("", "abc123", ".").is_err());
        assert!(Location::new("https://github.com/a/b", "abc123", ".").is_ok());
        assert!(Location::new("", "", "").is_ok());
    }

    #[test]
    fn strategy_json_round_trip() {
        let s = Strategy::NpmCustomBuild {
            location: Location::new("https://github.com/a/b", "deadbeef", ".").unwrap(),
            npm_version: "8.2.0".to_string(),
            node_version: "10.17.0".to_string(),
            command: Some("build".to_string()),
            registry_time: Some("2023-02-10T10:00:00Z".parse().unwrap()),
            prepack_remove_deps: true,
            keep_root: false,
            version_override: None,
        };
        let json = serde_json::to_string(&s).unwrap();
        let back: Strategy = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn strategy_yaml_round_trip() {
        let s = Strategy::Workflow {
            location: Location::new("https://github.com/a/b", "deadbeef", "pkg").unwrap(),
            source_steps: vec![FlowStep {
                uses: Some("git-checkout".to_string()),
                runs: None,
                with: BTreeMap::new(),
            }],
            deps_steps: vec![],
            build_steps: vec![FlowStep {
                runs: Some("npm pack".to_string()),
                ..FlowStep::default()
            }],
            output_dir: "pkg".to_string(),
        };
        let yaml = s.to_yaml().unwrap();
        assert_eq!(Strategy::from_yaml(&yaml).unwrap(), s);
    }
}
