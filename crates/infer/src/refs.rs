//! Ref resolution
//!
//! Step two of inference: find the commit the published version was
//! built from. Heuristics run in a fixed order, stopping at the first
//! that resolves to a commit present in the repo and validates (the
//! manifest exists there, its name matches exactly, its version matches
//! exactly):
//!
//! 1. The registry-supplied commit id (e.g. npm `gitHead`).
//! 2. A tag naming the version.
//! 3. The manifest's own history (version-bump commits).
//! 4. Version-override recovery: adopt a name-matching commit with the
//!    wrong version and patch the manifest during the build.

use crate::manifest::ManifestInfo;
use rebuildr_errors::{InferError, Result};
use rebuildr_repo::RepoHandle;
use rebuildr_types::Target;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Which heuristic produced the resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefHeuristic {
    RegistryCommit,
    VersionTag,
    ManifestHistory,
    VersionOverride,
}

/// A resolved ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefResolution {
    pub commit: String,
    pub version_override: Option<String>,
    pub heuristic: RefHeuristic,
}

/// Tag names that can carry a version: the version itself, `v`-prefixed,
/// or `package-`-prefixed.
fn tag_version(name: &str) -> &str {
    name.strip_prefix("package-")
        .or_else(|| name.strip_prefix('v'))
        .unwrap_or(name)
}

/// Resolve the ref for `target`.
///
/// `read_manifest` reads the manifest identity at a commit; it returns
/// `None` when the manifest is absent or unparsable there.
///
/// # Errors
///
/// `NoValidRef` when every heuristic fails.
pub fn resolve_ref(
    repo: &RepoHandle,
    target: &Target,
    registry_ref: Option<&str>,
    manifest_path: &str,
    read_manifest: &impl Fn(&str) -> Option<ManifestInfo>,
) -> Result<RefResolution> {
    let validates = |commit: &str| {
        read_manifest(commit)
            .is_some_and(|m| m.name == target.package && m.version == target.version)
    };

    // A commit whose manifest has the right name but wrong version; fuel
    // for the override recovery below.
    let mut name_match: Option<String> = None;
    let mut note_near_miss = |commit: &str| {
        if name_match.is_none() {
            if let Some(m) = read_manifest(commit) {
                if m.name == target.package && m.version != target.version {
                    name_match = Some(commit.to_string());
                }
            }
        }
    };

    // Heuristic 1: registry-recorded commit.
    if let Some(spec) = registry_ref {
        if let Ok(commit) = repo.resolve_commit(spec) {
            if validates(&commit) {
                return Ok(RefResolution {
                    commit,
                    version_override: None,
                    heuristic: RefHeuristic::RegistryCommit,
                });
            }
            note_near_miss(&commit);
        }
    }

    // Heuristic 2: version tags. Order is the documented stable
    // tiebreak: exact version-string equality first, then newest
    // commit, then lexicographic tag name.
    let mut matching: Vec<_> = repo
        .tags()
        .unwrap_or_default()
        .into_iter()
        .filter(|t| tag_version(&t.name) == target.version)
        .collect();
    if matching.len() > 1 {
        debug!(
            version = %target.version,
            count = matching.len(),
            "multiple tags match version"
        );
    }
    matching.sort_by(|a, b| {
        let a_exact = a.name == target.version;
        let b_exact = b.name == target.version;
        b_exact
            .cmp(&a_exact)
            .then(b.commit_time.cmp(&a.commit_time))
            .then(a.name.cmp(&b.name))
    });
    for tag in &matching {
        if validates(&tag.commit) {
            return Ok(RefResolution {
                commit: tag.commit.clone(),
                version_override: None,
                heuristic: RefHeuristic::VersionTag,
            });
        }
        note_near_miss(&tag.commit);
    }

    // Heuristic 3: version-bump commits in the manifest's history.
    if let Some(commit) = manifest_history_search(repo, target, manifest_path, read_manifest) {
        if validates(&commit) {
            return Ok(RefResolution {
                commit,
                version_override: None,
                heuristic: RefHeuristic::ManifestHistory,
            });
        }
    }

    // Heuristic 4: adopt a name-matching commit and patch the version
    // in place during the build.
    if let Some(commit) = name_match {
        return Ok(RefResolution {
            commit,
            version_override: Some(target.version.clone()),
            heuristic: RefHeuristic::VersionOverride,
        });
    }

    Err(InferError::NoValidRef {
        package: target.package.clone(),
        version: target.version.clone(),
    }
    .into())
}

/// Walk the commits touching the manifest in committer-time order and
/// map each version bump to its commit. A commit qualifies when its
/// manifest parses, the name matches, and the version differs from
/// every parent's. On duplicate versions the first seen wins and the
/// collision is logged.
fn manifest_history_search(
    repo: &RepoHandle,
    target: &Target,
    manifest_path: &str,
    read_manifest: &impl Fn(&str) -> Option<ManifestInfo>,
) -> Option<String> {
    let log = repo.log_touching(manifest_path).ok()?;
    let mut by_version: HashMap<String, String> = HashMap::new();

    for commit in &log {
        let Some(manifest) = read_manifest(&commit.id) else {
            continue;
        };
        if manifest.name != target.package {
            continue;
        }
        let bumped = commit
            .parents
            .iter()
            .all(|p| read_manifest(p).is_none_or(|pm| pm.version != manifest.version));
        if !bumped {
            continue;
        }
        if let Some(existing) = by_version.get(&manifest.version) {
            warn!(
                version = %manifest.version,
                kept = %existing,
                dropped = %commit.id,
                "duplicate version bump in manifest history"
            );
            continue;
        }
        by_version.insert(manifest.version.clone(), commit.id.clone());
    }

    by_version.get(&target.version).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_version_strips_known_prefixes() {
        assert_eq!(tag_version("v1.0.0"), "1.0.0");
        assert_eq!(tag_version("package-1.0.0"), "1.0.0");
        assert_eq!(tag_version("1.0.0"), "1.0.0");
        assert_eq!(tag_version("release-1.0.0"), "release-1.0.0");
    }
}
