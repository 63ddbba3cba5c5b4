//! npm strategy inference

use crate::manifest::{locate_manifest, manifest_dir, ManifestInfo};
use crate::refs::resolve_ref;
use crate::{Rebuilder, RegistryEvidence};
use rebuildr_errors::{InferError, Result};
use rebuildr_repo::RepoHandle;
use rebuildr_types::{version as semver_util, Ecosystem, Location, Strategy, Target};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Node version used when the registry recorded nothing usable.
pub const DEFAULT_NODE_VERSION: &str = "10.17.0";

/// One release on unofficial-builds.nodejs.org, date-ordered.
/// `has_musl` records whether a linux-x64-musl tarball exists for it.
struct NodeRelease {
    version: &'static str,
    has_musl: bool,
}

/// Date-ordered snapshot of the unofficial-builds release index.
const UNOFFICIAL_NODE_RELEASES: &[NodeRelease] = &[
    NodeRelease { version: "10.16.0", has_musl: true },
    NodeRelease { version: "10.17.0", has_musl: true },
    NodeRelease { version: "10.19.0", has_musl: true },
    NodeRelease { version: "11.15.0", has_musl: false },
    NodeRelease { version: "12.13.0", has_musl: true },
    NodeRelease { version: "12.18.3", has_musl: true },
    NodeRelease { version: "12.22.5", has_musl: true },
    NodeRelease { version: "13.14.0", has_musl: false },
    NodeRelease { version: "14.4.0", has_musl: true },
    NodeRelease { version: "14.14.0", has_musl: false },
    NodeRelease { version: "14.15.0", has_musl: true },
    NodeRelease { version: "14.15.1", has_musl: true },
    NodeRelease { version: "14.15.4", has_musl: true },
    NodeRelease { version: "14.15.5", has_musl: true },
    NodeRelease { version: "15.3.0", has_musl: false },
    NodeRelease { version: "16.9.1", has_musl: false },
    NodeRelease { version: "17.0.0", has_musl: false },
];

/// Select the npm CLI version to pack with.
///
/// Early npm produces tarballs no modern npm can reproduce, so versions
/// below 5 are bumped to 5.0.4, and the broken 5.4/5.5 series to 5.6.0.
///
/// # Errors
///
/// Rejects empty input and prerelease/build versions.
pub fn pick_npm_version(published: &str) -> Result<String> {
    if published.is_empty() {
        return Err(InferError::VersionPick {
            message: "no npm version recorded on the registry".to_string(),
        }
        .into());
    }
    let v = semver_util::parse(published).map_err(|_| InferError::VersionPick {
        message: format!("unparsable npm version {published}"),
    })?;
    if !v.pre.is_empty() || !v.build.is_empty() {
        return Err(InferError::VersionPick {
            message: format!("refusing prerelease npm version {published}"),
        }
        .into());
    }
    if v.major < 5 {
        return Ok("5.0.4".to_string());
    }
    if v.major == 5 && (v.minor == 4 || v.minor == 5) {
        return Ok("5.6.0".to_string());
    }
    Ok(published.to_string())
}

/// Select the Node version to install from unofficial-builds.
///
/// Empty input gets the default. A version newer than anything in the
/// table is trusted as-is. An exact table match with a musl build is
/// kept. Otherwise the next higher release series with a musl build
/// supplies its highest patch; with no such series, the default.
#[must_use]
pub fn pick_node_version(published: &str) -> String {
    if published.is_empty() {
        return DEFAULT_NODE_VERSION.to_string();
    }
    let Ok(wanted) = semver_util::parse(published) else {
        return DEFAULT_NODE_VERSION.to_string();
    };

    let parsed: Vec<(semver::Version, bool)> = UNOFFICIAL_NODE_RELEASES
        .iter()
        .filter_map(|r| semver_util::parse(r.version).ok().map(|v| (v, r.has_musl)))
        .collect();

    if let Some(newest) = parsed.iter().map(|(v, _)| v).max() {
        if wanted > *newest {
            return published.to_string();
        }
    }

    if parsed.iter().any(|(v, musl)| *musl && *v == wanted) {
        return published.to_string();
    }

    // Next higher release series with a musl build, highest patch.
    let next = parsed
        .iter()
        .filter(|(v, musl)| *musl && *v > wanted)
        .map(|(v, _)| v)
        .min();
    if let Some(next) = next {
        let best = parsed
            .iter()
            .filter(|(v, musl)| *musl && v.major == next.major && v.minor == next.minor)
            .map(|(v, _)| v)
            .max();
        if let Some(best) = best {
            return best.to_string();
        }
    }

    DEFAULT_NODE_VERSION.to_string()
}

#[derive(Debug, Deserialize)]
struct PackageJson {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    scripts: BTreeMap<String, serde_json::Value>,
}

fn read_package_json(repo: &RepoHandle, commit: &str, path: &str) -> Option<PackageJson> {
    let bytes = repo.read_file(commit, path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub struct NpmRebuilder;

impl NpmRebuilder {
    fn well_known_paths(target: &Target, evidence: &RegistryEvidence) -> Vec<String> {
        let mut paths = Vec::new();
        if let Some(dir) = evidence.repo_directory() {
            paths.push(format!("{}/package.json", dir.trim_end_matches('/')));
        }
        paths.push("package.json".to_string());
        let tail = target
            .package
            .rsplit('/')
            .next()
            .unwrap_or(&target.package);
        paths.push(format!("packages/{tail}/package.json"));
        paths.dedup();
        paths
    }
}

impl Rebuilder for NpmRebuilder {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
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

        // Step 1: locate the manifest at the repository head.
        let head = repo.resolve_commit("HEAD")?;
        let pathspec = Regex::new(r"(^|/)package\.json$").expect("static regex");
        let name_pattern = Regex::new(&format!(
            r#""name"\s*:\s*"{}""#,
            regex::escape(&target.package)
        ))
        .expect("escaped name regex");
        let names_package = |path: &str| {
            read_package_json(repo, &head, path).is_some_and(|m| m.name == target.package)
        };
        let manifest_path = hint
            .filter(|h| !h.dir.is_empty() && h.dir != ".")
            .map(|h| format!("{}/package.json", h.dir.trim_end_matches('/')))
            .or_else(|| {
                locate_manifest(
                    repo,
                    &head,
                    &Self::well_known_paths(target, evidence),
                    &pathspec,
                    &name_pattern,
                    &names_package,
                )
            })
            .ok_or_else(|| InferError::ManifestNotFound {
                package: target.package.clone(),
            })?;

        // Step 2: resolve the ref.
        let read = |commit: &str| {
            read_package_json(repo, commit, &manifest_path).map(|m| ManifestInfo {
                name: m.name,
                version: m.version,
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

        // Step 3: shape the strategy from the manifest at the chosen ref.
        let manifest =
            read_package_json(repo, &resolution.commit, &manifest_path).ok_or_else(|| {
                InferError::ManifestParse {
                    path: manifest_path.clone(),
                    message: "manifest unreadable at resolved ref".to_string(),
                }
            })?;

        let location = Location::new(
            hint.map_or_else(
                || repo.url().to_string(),
                |h| {
                    if h.repo.is_empty() {
                        repo.url().to_string()
                    } else {
                        h.repo.clone()
                    }
                },
            ),
            resolution.commit.clone(),
            manifest_dir(&manifest_path),
        )?;

        let npm_published = evidence
            .version
            .tool_versions
            .get("npm")
            .map_or("", String::as_str);
        let npm_version = pick_npm_version(npm_published)?;

        let has_script = |name: &str| manifest.scripts.contains_key(name);
        if has_script("prepack") || has_script("prepare") || has_script("build") {
            let node_published = evidence
                .version
                .tool_versions
                .get("node")
                .map_or("", String::as_str);
            let npm_major = semver_util::parse(&npm_version).map(|v| v.major).unwrap_or(0);
            return Ok(Strategy::NpmCustomBuild {
                location,
                npm_version,
                node_version: pick_node_version(node_published),
                command: has_script("build").then(|| "build".to_string()),
                registry_time: evidence
                    .version
                    .upload_time
                    .or_else(|| evidence.package.upload_time(&target.version)),
                prepack_remove_deps: !(has_script("prepare") || has_script("prepack")),
                keep_root: npm_major <= 6,
                version_override: resolution.version_override.clone(),
            });
        }

        Ok(Strategy::NpmPackBuild {
            location,
            npm_version,
            version_override: resolution.version_override,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npm_version_picks() {
        assert_eq!(pick_npm_version("8.1.2").unwrap(), "8.1.2");
        assert_eq!(pick_npm_version("4.6.1").unwrap(), "5.0.4");
        assert_eq!(pick_npm_version("5.4.2").unwrap(), "5.6.0");
        assert_eq!(pick_npm_version("5.5.1").unwrap(), "5.6.0");
        assert_eq!(pick_npm_version("5.6.0").unwrap(), "5.6.0");
        assert!(pick_npm_version("").is_err());
        assert!(pick_npm_version("6.0.0-beta.1").is_err());
        assert!(pick_npm_version("6.0.0+build5").is_err());
    }

    #[test]
    fn node_version_picks() {
        // empty input gets the default
        assert_eq!(pick_node_version(""), DEFAULT_NODE_VERSION);
        // exact musl match is kept
        assert_eq!(pick_node_version("12.13.0"), "12.13.0");
        // next higher series with musl, highest patch
        assert_eq!(pick_node_version("14.14.1"), "14.15.5");
        // nothing musl above it: default
        assert_eq!(pick_node_version("16.13.0"), DEFAULT_NODE_VERSION);
        // newer than the whole table: trusted as-is
        assert_eq!(pick_node_version("18.0.0"), "18.0.0");
    }
}
