//! Maven Central registry client (repo1.maven.org)
//!
//! Package names are `groupId:artifactId`. The two metadata documents
//! consumed here (`maven-metadata.xml` and the version POM) are
//! line-regular, so the handful of fields needed are scraped with
//! regexes rather than a full XML parser.

use crate::models::{PackageMeta, RepositoryRef, VersionMeta};
use crate::{RegistryClient, RegistryContext};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use rebuildr_errors::{RegistryError, Result};
use rebuildr_types::Ecosystem;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const DEFAULT_BASE: &str = "https://repo1.maven.org/maven2";

pub struct MavenRegistry {
    ctx: RegistryContext,
    base: String,
}

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<version>([^<]+)</version>").unwrap())
}

fn scm_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<scm>.*?<url>([^<]+)</url>").unwrap())
}

fn last_updated_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<lastUpdated>(\d{14})</lastUpdated>").unwrap())
}

fn jdk_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<maven\.compiler\.(?:source|release)>([^<]+)</maven\.compiler\.(?:source|release)>")
            .unwrap()
    })
}

/// Split `groupId:artifactId`.
fn split_coordinates(package: &str) -> Result<(&str, &str)> {
    package.split_once(':').ok_or_else(|| {
        RegistryError::Malformed {
            message: format!("maven package must be groupId:artifactId, got {package}"),
        }
        .into()
    })
}

impl MavenRegistry {
    #[must_use]
    pub fn new(ctx: RegistryContext) -> Self {
        Self::with_base(ctx, DEFAULT_BASE)
    }

    #[must_use]
    pub fn with_base(ctx: RegistryContext, base: impl Into<String>) -> Self {
        Self {
            ctx,
            base: base.into(),
        }
    }

    fn artifact_dir(&self, group: &str, artifact: &str) -> String {
        format!("{}/{}/{artifact}", self.base, group.replace('.', "/"))
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.ctx.limiter.acquire(Ecosystem::Maven).await;
        let body = self.ctx.net.get_bytes(url).await?;
        String::from_utf8(body.to_vec()).map_err(|e| {
            RegistryError::Malformed {
                message: format!("non-UTF8 document at {url}: {e}"),
            }
            .into()
        })
    }
}

#[async_trait]
impl RegistryClient for MavenRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Maven
    }

    async fn package(&self, package: &str) -> Result<PackageMeta> {
        let (group, artifact) = split_coordinates(package)?;
        let url = format!("{}/maven-metadata.xml", self.artifact_dir(group, artifact));
        let xml = self.fetch_text(&url).await?;

        let versions: Vec<String> = version_re()
            .captures_iter(&xml)
            .map(|c| c[1].to_string())
            .collect();
        if versions.is_empty() {
            return Err(RegistryError::Malformed {
                message: format!("no versions in maven-metadata.xml for {package}"),
            }
            .into());
        }

        // Only the artifact-level lastUpdated is available here; the
        // per-version instant comes from the version() POM fetch.
        let mut upload_times = BTreeMap::new();
        if let Some(c) = last_updated_re().captures(&xml) {
            if let Ok(naive) = NaiveDateTime::parse_from_str(&c[1], "%Y%m%d%H%M%S") {
                let at: DateTime<Utc> = naive.and_utc();
                if let Some(latest) = versions.last() {
                    upload_times.insert(latest.clone(), at);
                }
            }
        }

        Ok(PackageMeta {
            name: package.to_string(),
            versions,
            upload_times,
            repository: None,
        })
    }

    async fn version(&self, package: &str, version: &str) -> Result<VersionMeta> {
        let (group, artifact) = split_coordinates(package)?;
        let dir = self.artifact_dir(group, artifact);
        let pom_url = format!("{dir}/{version}/{artifact}-{version}.pom");
        let pom = self.fetch_text(&pom_url).await?;

        let repository = scm_url_re().captures(&pom).map(|c| RepositoryRef {
            url: c[1].trim().to_string(),
            directory: None,
        });

        let mut tool_versions = BTreeMap::new();
        if let Some(c) = jdk_re().captures(&pom) {
            tool_versions.insert("jdk".to_string(), c[1].trim().to_string());
        }

        Ok(VersionMeta {
            repository,
            integrity: None,
            dist_url: Some(format!("{dir}/{version}/{artifact}-{version}.jar")),
            git_ref: None,
            tool_versions,
            scripts: BTreeMap::new(),
            upload_time: None,
        })
    }

    async fn artifact(&self, package: &str, version: &str) -> Result<Bytes> {
        let (group, artifact) = split_coordinates(package)?;
        let url = format!(
            "{}/{version}/{artifact}-{version}.jar",
            self.artifact_dir(group, artifact)
        );
        self.ctx.limiter.acquire(Ecosystem::Maven).await;
        self.ctx.net.get_bytes(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrapes_versions_and_scm() {
        let xml = "<metadata><versioning><versions>\
                   <version>1.0</version><version>1.1</version>\
                   </versions><lastUpdated>20230210100000</lastUpdated></versioning></metadata>";
        let versions: Vec<_> = version_re()
            .captures_iter(xml)
            .map(|c| c[1].to_string())
            .collect();
        assert_eq!(versions, vec!["1.0", "1.1"]);

        let pom = "<project><scm><connection>scm:git</connection>\
                   <url>https://github.com/google/guava</url></scm></project>";
        assert_eq!(
            &scm_url_re().captures(pom).unwrap()[1],
            "https://github.com/google/guava"
        );
    }

    #[test]
    fn rejects_bare_package_names() {
        assert!(split_coordinates("guava").is_err());
        assert_eq!(
            split_coordinates("com.google.guava:guava").unwrap(),
            ("com.google.guava", "guava")
        );
    }
}
