//! Benchmark file model
//!
//! A benchmark is a JSON list of packages and versions to push through
//! the pipeline. Field names are capitalized on the wire for
//! compatibility with existing benchmark files.

use crate::target::{Ecosystem, Target};
use chrono::{DateTime, Utc};
use rebuildr_errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// One package with its versions (and optionally artifact names,
/// parallel to the versions list).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkPackage {
    #[serde(rename = "Ecosystem")]
    pub ecosystem: Ecosystem,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Versions")]
    pub versions: Vec<String>,
    #[serde(rename = "Artifacts", default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<String>>,
}

/// A benchmark file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSet {
    #[serde(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Updated")]
    pub updated: DateTime<Utc>,
    #[serde(rename = "Packages")]
    pub packages: Vec<BenchmarkPackage>,
}

impl BenchmarkSet {
    /// Parse a benchmark file from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or when an `Artifacts` list is
    /// not parallel to its `Versions` list.
    pub fn from_json(doc: &str) -> Result<Self> {
        let set: BenchmarkSet =
            serde_json::from_str(doc).map_err(|e| Error::internal(format!("benchmark: {e}")))?;
        for pkg in &set.packages {
            if let Some(artifacts) = &pkg.artifacts {
                if artifacts.len() != pkg.versions.len() {
                    return Err(Error::internal(format!(
                        "benchmark package {}: {} artifacts for {} versions",
                        pkg.name,
                        artifacts.len(),
                        pkg.versions.len()
                    )));
                }
            }
        }
        Ok(set)
    }

    /// Expand into one target per (name, version, artifact?).
    ///
    /// # Errors
    ///
    /// Returns an error if any entry has an empty name or version.
    pub fn targets(&self) -> Result<Vec<Target>> {
        let mut out = Vec::new();
        for pkg in &self.packages {
            for (i, version) in pkg.versions.iter().enumerate() {
                let mut target = Target::new(pkg.ecosystem, pkg.name.clone(), version.clone())?;
                if let Some(artifacts) = &pkg.artifacts {
                    target.set_artifact(artifacts[i].clone())?;
                }
                out.push(target);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "Count": 2,
        "Updated": "2024-01-05T00:00:00Z",
        "Packages": [
            {"Ecosystem": "npm", "Name": "left-pad", "Versions": ["1.3.0", "1.2.0"]},
            {"Ecosystem": "pypi", "Name": "six", "Versions": ["1.16.0"],
             "Artifacts": ["six-1.16.0-py2.py3-none-any.whl"]}
        ]
    }"#;

    #[test]
    fn parses_and_expands() {
        let set = BenchmarkSet::from_json(DOC).unwrap();
        let targets = set.targets().unwrap();
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0].package, "left-pad");
        assert_eq!(targets[2].artifact_name(), "six-1.16.0-py2.py3-none-any.whl");
    }

    #[test]
    fn rejects_misaligned_artifacts() {
        let doc = r#"{
            "Count": 1,
            "Updated": "2024-01-05T00:00:00Z",
            "Packages": [
                {"Ecosystem": "npm", "Name": "a", "Versions": ["1.0.0", "2.0.0"],
                 "Artifacts": ["a-1.0.0.tgz"]}
            ]
        }"#;
        assert!(BenchmarkSet::from_json(doc).is_err());
    }
}
