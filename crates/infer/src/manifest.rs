//! Manifest location and validation
//!
//! Step one of inference: find the file that names the package. Well
//! known paths are tried first; failing that, a repository-wide grep
//! for an ecosystem-specific name-matching pattern. When several
//! candidates match, the shortest path wins and the tie is logged.

use rebuildr_repo::RepoHandle;
use regex::Regex;
use tracing::debug;

/// The identity fields read out of a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestInfo {
    pub name: String,
    pub version: String,
}

/// Locate the manifest at `commit`.
///
/// `well_known` paths are probed in order and must match the package by
/// name (`names_package`); the grep fallback matches file paths against
/// `pathspec` and lines against `name_pattern`.
pub fn locate_manifest(
    repo: &RepoHandle,
    commit: &str,
    well_known: &[String],
    pathspec: &Regex,
    name_pattern: &Regex,
    names_package: &impl Fn(&str) -> bool,
) -> Option<String> {
    let mut existing = None;
    for path in well_known {
        if repo.has_path(commit, path) {
            if names_package(path) {
                return Some(path.clone());
            }
            if existing.is_none() {
                existing = Some(path.clone());
            }
        }
    }

    let hits = repo.grep(commit, pathspec, name_pattern).ok()?;
    let mut files: Vec<String> = hits.into_iter().map(|h| h.file).collect();
    files.sort();
    files.dedup();
    if files.is_empty() {
        // Nothing names the package; hand back an existing well-known
        // manifest so ref resolution can report the mismatch precisely.
        return existing;
    }
    // Shortest path wins; ties are broken lexicographically by the sort
    // above and logged.
    files.sort_by_key(|f| (f.len(), f.clone()));
    if files.len() > 1 {
        debug!(
            chosen = %files[0],
            others = files.len() - 1,
            "multiple manifest candidates matched"
        );
    }
    files.into_iter().next()
}

/// Directory component of a manifest path, `.` at the root.
#[must_use]
pub fn manifest_dir(manifest_path: &str) -> String {
    match manifest_path.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => ".".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_dir_handles_root_and_nested() {
        assert_eq!(manifest_dir("package.json"), ".");
        assert_eq!(manifest_dir("packages/core/package.json"), "packages/core");
    }
}
