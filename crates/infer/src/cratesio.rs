//! crates.io strategy inference

use crate::manifest::{locate_manifest, manifest_dir, ManifestInfo};
use crate::refs::resolve_ref;
use crate::{Rebuilder, RegistryEvidence};
use chrono::{DateTime, Utc};
use rebuildr_errors::{InferError, Result};
use rebuildr_repo::RepoHandle;
use rebuildr_types::{Ecosystem, Location, Strategy, Target};
use regex::Regex;
use serde::Deserialize;

/// Fallback toolchain when neither the manifest nor the upload date
/// pins one.
pub const DEFAULT_RUST_VERSION: &str = "1.70.0";

/// Stable releases by date, newest last. Used to pick the toolchain
/// current at upload time when the manifest declares no `rust-version`.
const RUST_RELEASES: &[(&str, &str)] = &[
    ("1.50.0", "2021-02-11"),
    ("1.56.0", "2021-10-21"),
    ("1.60.0", "2022-04-07"),
    ("1.65.0", "2022-11-03"),
    ("1.70.0", "2023-06-01"),
    ("1.75.0", "2023-12-28"),
    ("1.80.0", "2024-07-25"),
    ("1.85.0", "2025-02-20"),
];

/// The newest stable released before `at`.
#[must_use]
pub fn rust_version_at(at: DateTime<Utc>) -> String {
    let date = at.date_naive();
    RUST_RELEASES
        .iter()
        .rev()
        .find(|(_, released)| {
            released
                .parse::<chrono::NaiveDate>()
                .is_ok_and(|r| r <= date)
        })
        .map_or_else(|| DEFAULT_RUST_VERSION.to_string(), |(v, _)| (*v).to_string())
}

#[derive(Debug, Deserialize)]
struct CargoManifest {
    #[serde(default)]
    package: Option<CargoPackage>,
}

#[derive(Debug, Deserialize)]
struct CargoPackage {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<toml::Value>,
    #[serde(default, rename = "rust-version")]
    rust_version: Option<toml::Value>,
}

fn read_cargo_toml(repo: &RepoHandle, commit: &str, path: &str) -> Option<CargoManifest> {
    let bytes = repo.read_file(commit, path).ok()?;
    toml::from_str(std::str::from_utf8(&bytes).ok()?).ok()
}

fn read_manifest(repo: &RepoHandle, commit: &str, path: &str) -> Option<ManifestInfo> {
    let doc = read_cargo_toml(repo, commit, path)?;
    let package = doc.package?;
    // `version.workspace = true` and friends resolve to non-string
    // values; those commits cannot validate and are skipped.
    Some(ManifestInfo {
        name: package.name?,
        version: package.version?.as_str()?.to_string(),
    })
}

pub struct CratesRebuilder;

impl Rebuilder for CratesRebuilder {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::CratesIO
    }

    fn infer(
        &self,
        target: &Target,
        evidence: &RegistryEvidence,
        repo: Option<&RepoHandle>,
        hint: Option<&Location>,
    ) -> Result<Strategy> {
        let repo = repo.ok_or_else(|| InferError::MissingRepo {
            package: target.package.clone(),
        })?;

        let head = repo.resolve_commit("HEAD")?;
        let well_known = vec![
            "Cargo.toml".to_string(),
            format!("crates/{}/Cargo.toml", target.package),
            format!("{}/Cargo.toml", target.package),
        ];
        let pathspec = Regex::new(r"(^|/)Cargo\.toml$").expect("static regex");
        let name_pattern = Regex::new(&format!(
            r#"name\s*=\s*"{}""#,
            regex::escape(&target.package)
        ))
        .expect("escaped name regex");
        let names_package = |path: &str| {
            read_manifest(repo, &head, path).is_some_and(|m| m.name == target.package)
        };
        let manifest_path = locate_manifest(
            repo,
            &head,
            &well_known,
            &pathspec,
            &name_pattern,
            &names_package,
        )
        .ok_or_else(|| InferError::ManifestNotFound {
            package: target.package.clone(),
        })?;

        let read = |commit: &str| read_manifest(repo, commit, &manifest_path);
        let registry_ref = hint
            .filter(|h| !h.git_ref.is_empty())
            .map(|h| h.git_ref.clone());
        let resolution = resolve_ref(
            repo,
            target,
            registry_ref.as_deref(),
            &manifest_path,
            &read,
        )?;

        // Toolchain: manifest rust-version, then the registry's record,
        // then the stable release current at upload time.
        let manifest_rust = read_cargo_toml(repo, &resolution.commit, &manifest_path)
            .and_then(|d| d.package)
            .and_then(|p| p.rust_version)
            .and_then(|v| v.as_str().map(ToString::to_string));
        let rust_version = manifest_rust
            .or_else(|| evidence.version.tool_versions.get("rust").cloned())
            .or_else(|| evidence.version.upload_time.map(rust_version_at))
            .unwrap_or_else(|| DEFAULT_RUST_VERSION.to_string());

        let location = Location::new(
            hint.filter(|h| !h.repo.is_empty())
                .map_or_else(|| repo.url().to_string(), |h| h.repo.clone()),
            resolution.commit,
            manifest_dir(&manifest_path),
        )?;

        Ok(Strategy::CratesioCargoPackage {
            location,
            rust_version,
            pre_commands: Vec::new(),
        })
    }
}
