//! Maven strategy inference

use crate::manifest::{locate_manifest, manifest_dir, ManifestInfo};
use crate::refs::resolve_ref;
use crate::{Rebuilder, RegistryEvidence};
use rebuildr_errors::{InferError, Result};
use rebuildr_repo::RepoHandle;
use rebuildr_types::{Ecosystem, Location, Strategy, Target};
use regex::Regex;
use std::sync::OnceLock;

/// JDK used when the POM pins nothing.
pub const DEFAULT_JDK: &str = "11";

fn artifact_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<artifactId>([^<]+)</artifactId>").unwrap())
}

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<version>([^<]+)</version>").unwrap())
}

/// Read the POM's own artifactId/version. The first `<artifactId>` and
/// `<version>` outside `<parent>`/`<dependencies>` belong to the
/// project element in well-formed POMs; stripping those sections first
/// keeps the scrape honest.
fn read_pom(repo: &RepoHandle, commit: &str, path: &str) -> Option<ManifestInfo> {
    let bytes = repo.read_file(commit, path).ok()?;
    let text = std::str::from_utf8(&bytes).ok()?;
    let stripped = strip_sections(text, &["parent", "dependencies", "dependencyManagement", "build", "plugins"]);
    Some(ManifestInfo {
        name: artifact_id_re().captures(&stripped)?[1].trim().to_string(),
        version: version_re().captures(&stripped)?[1].trim().to_string(),
    })
}

fn strip_sections(text: &str, sections: &[&str]) -> String {
    let mut out = text.to_string();
    for section in sections {
        let re = Regex::new(&format!(r"(?s)<{section}>.*?</{section}>")).expect("static regex");
        out = re.replace_all(&out, "").to_string();
    }
    out
}

pub struct MavenRebuilder;

impl Rebuilder for MavenRebuilder {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Maven
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

        let artifact_id = target
            .package
            .rsplit(':')
            .next()
            .unwrap_or(&target.package)
            .to_string();

        let head = repo.resolve_commit("HEAD")?;
        let well_known = vec![
            "pom.xml".to_string(),
            format!("{artifact_id}/pom.xml"),
        ];
        let pathspec = Regex::new(r"(^|/)pom\.xml$").expect("static regex");
        let name_pattern = Regex::new(&format!(
            r"<artifactId>{}</artifactId>",
            regex::escape(&artifact_id)
        ))
        .expect("escaped name regex");
        let names_package =
            |path: &str| read_pom(repo, &head, path).is_some_and(|m| m.name == artifact_id);
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

        // POMs name only the artifactId; identity comparison uses it.
        let read = |commit: &str| {
            read_pom(repo, commit, &manifest_path).map(|mut m| {
                if m.name == artifact_id {
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

        let jdk_version = evidence
            .version
            .tool_versions
            .get("jdk")
            .cloned()
            .unwrap_or_else(|| DEFAULT_JDK.to_string());

        let location = Location::new(
            hint.filter(|h| !h.repo.is_empty())
                .map_or_else(|| repo.url().to_string(), |h| h.repo.clone()),
            resolution.commit,
            manifest_dir(&manifest_path),
        )?;

        Ok(Strategy::MavenBuild {
            location,
            jdk_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_removes_parent_version() {
        let pom = "<project><parent><artifactId>parent</artifactId><version>9</version></parent>\
                   <artifactId>guava</artifactId><version>32.1.2</version></project>";
        let stripped = strip_sections(pom, &["parent"]);
        assert_eq!(&artifact_id_re().captures(&stripped).unwrap()[1], "guava");
        assert_eq!(&version_re().captures(&stripped).unwrap()[1], "32.1.2");
    }
}
