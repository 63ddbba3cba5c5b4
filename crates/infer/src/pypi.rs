//! PyPI strategy inference

use crate::manifest::{locate_manifest, manifest_dir, ManifestInfo};
use crate::refs::resolve_ref;
use crate::{Rebuilder, RegistryEvidence};
use rebuildr_errors::{InferError, Result};
use rebuildr_repo::RepoHandle;
use rebuildr_types::{Ecosystem, Location, Strategy, Target};
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct PyProject {
    #[serde(default)]
    project: Option<ProjectTable>,
    #[serde(default, rename = "build-system")]
    build_system: Option<BuildSystemTable>,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectTable {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BuildSystemTable {
    #[serde(default)]
    requires: Vec<String>,
}

/// PyPI treats `-`, `_` and `.` as equivalent and names as
/// case-insensitive.
fn normalize_name(name: &str) -> String {
    name.replace(['-', '.'], "_").to_lowercase()
}

fn read_pyproject(repo: &RepoHandle, commit: &str, path: &str) -> Option<PyProject> {
    let bytes = repo.read_file(commit, path).ok()?;
    toml::from_str(std::str::from_utf8(&bytes).ok()?).ok()
}

/// setup.py identity via the keyword arguments; good enough for the
/// static setup() calls that dominate published sdists.
fn read_setup_py(repo: &RepoHandle, commit: &str, path: &str) -> Option<ManifestInfo> {
    let bytes = repo.read_file(commit, path).ok()?;
    let text = std::str::from_utf8(&bytes).ok()?;
    let name_re = Regex::new(r#"name\s*=\s*["']([^"']+)["']"#).ok()?;
    let version_re = Regex::new(r#"version\s*=\s*["']([^"']+)["']"#).ok()?;
    Some(ManifestInfo {
        name: name_re.captures(text)?[1].to_string(),
        version: version_re.captures(text)?.get(1)?.as_str().to_string(),
    })
}

fn read_manifest(repo: &RepoHandle, commit: &str, path: &str) -> Option<ManifestInfo> {
    if path.ends_with("pyproject.toml") {
        let doc = read_pyproject(repo, commit, path)?;
        let project = doc.project?;
        return Some(ManifestInfo {
            name: project.name?,
            version: project.version?,
        });
    }
    read_setup_py(repo, commit, path)
}

pub struct PypiRebuilder;

impl Rebuilder for PypiRebuilder {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::PyPI
    }

    fn infer(
        &self,
        target: &Target,
        _evidence: &RegistryEvidence,
        repo: Option<&RepoHandle>,
        hint: Option<&Location>,
    ) -> Result<Strategy> {
        let repo = repo.ok_or_else(|| InferError::MissingRepo {
            package: target.package.clone(),
        })?;

        let head = repo.resolve_commit("HEAD")?;
        let well_known = vec![
            "pyproject.toml".to_string(),
            "setup.py".to_string(),
            format!("{}/pyproject.toml", target.package),
            format!("{}/setup.py", target.package),
        ];
        let pathspec = Regex::new(r"(^|/)(pyproject\.toml|setup\.py)$").expect("static regex");
        let name_pattern = Regex::new(&format!(
            r#"name\s*=\s*["']{}["']"#,
            regex::escape(&target.package)
        ))
        .expect("escaped name regex");
        let names_package = |path: &str| {
            read_manifest(repo, &head, path)
                .is_some_and(|m| normalize_name(&m.name) == normalize_name(&target.package))
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

        // Name comparison is normalized the way the index normalizes.
        let read = |commit: &str| {
            read_manifest(repo, commit, &manifest_path).map(|mut m| {
                if normalize_name(&m.name) == normalize_name(&target.package) {
                    m.name = target.package.clone();
                }
                m
            })
        };
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

        let requirements = if manifest_path.ends_with("pyproject.toml") {
            read_pyproject(repo, &resolution.commit, &manifest_path)
                .and_then(|d| d.build_system)
                .map(|b| b.requires)
                .unwrap_or_default()
        } else {
            vec!["setuptools".to_string(), "wheel".to_string()]
        };

        let location = Location::new(
            hint.filter(|h| !h.repo.is_empty())
                .map_or_else(|| repo.url().to_string(), |h| h.repo.clone()),
            resolution.commit,
            manifest_dir(&manifest_path),
        )?;

        Ok(Strategy::PypiPureWheelBuild {
            location,
            requirements,
        })
    }
}
