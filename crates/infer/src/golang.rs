//! Go module strategy inference
//!
//! Module versions are git tags by construction, so ref resolution is
//! nearly always the tag heuristic; the proxy's origin hash serves as
//! the registry-supplied commit when present.

use crate::manifest::{locate_manifest, manifest_dir, ManifestInfo};
use crate::refs::resolve_ref;
use crate::{Rebuilder, RegistryEvidence};
use rebuildr_errors::{InferError, Result};
use rebuildr_repo::RepoHandle;
use rebuildr_types::{Ecosystem, Location, Strategy, Target};
use regex::Regex;

/// Toolchain used when the module pins nothing.
pub const DEFAULT_GO_VERSION: &str = "1.21.0";

fn read_go_mod(repo: &RepoHandle, commit: &str, path: &str) -> Option<ManifestInfo> {
    let bytes = repo.read_file(commit, path).ok()?;
    let text = std::str::from_utf8(&bytes).ok()?;
    let module = text
        .lines()
        .find_map(|l| l.trim().strip_prefix("module "))?
        .trim()
        .to_string();
    // go.mod carries no version; module identity is all it can assert.
    Some(ManifestInfo {
        name: module,
        version: String::new(),
    })
}

pub struct GoRebuilder;

impl Rebuilder for GoRebuilder {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Go
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
        let well_known = vec!["go.mod".to_string()];
        let pathspec = Regex::new(r"(^|/)go\.mod$").expect("static regex");
        let name_pattern = Regex::new(&format!(
            r"^module\s+{}$",
            regex::escape(&target.package)
        ))
        .expect("escaped name regex");
        let names_package = |path: &str| {
            read_go_mod(repo, &head, path).is_some_and(|m| m.name == target.package)
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

        // go.mod has no version field, so validation accepts any commit
        // whose module path matches; the tag itself is the version
        // assertion.
        let read = |commit: &str| {
            read_go_mod(repo, commit, &manifest_path).map(|mut m| {
                if m.name == target.package {
                    m.version = target.version.clone();
                }
                m
            })
        };
        let registry_ref = hint
            .filter(|h| !h.git_ref.is_empty())
            .map(|h| h.git_ref.clone())
            .or_else(|| evidence.version.git_ref.clone());
        let resolution = resolve_ref(
            repo,
            target,
            registry_ref.as_deref(),
            &manifest_path,
            &read,
        )?;

        let location = Location::new(
            hint.filter(|h| !h.repo.is_empty())
                .map_or_else(|| repo.url().to_string(), |h| h.repo.clone()),
            resolution.commit,
            manifest_dir(&manifest_path),
        )?;

        Ok(Strategy::GoModuleBuild {
            location,
            go_version: DEFAULT_GO_VERSION.to_string(),
        })
    }
}
