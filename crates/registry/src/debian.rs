//! Debian registry client (snapshot.debian.org)
//!
//! The snapshot service exposes every archived version of a source
//! package plus the content-addressed files backing it; that makes it
//! both the metadata source and the artifact mirror here.

use crate::models::{PackageMeta, VersionMeta};
use crate::{RegistryClient, RegistryContext};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use rebuildr_errors::{RegistryError, Result};
use rebuildr_types::Ecosystem;
use serde::Deserialize;
use std::collections::BTreeMap;

pub const DEFAULT_BASE: &str = "https://snapshot.debian.org";

pub struct DebianRegistry {
    ctx: RegistryContext,
    base: String,
}

#[derive(Debug, Deserialize)]
struct PackageDoc {
    package: String,
    #[serde(default)]
    result: Vec<VersionEntry>,
}

#[derive(Debug, Deserialize)]
struct VersionEntry {
    version: String,
}

#[derive(Debug, Deserialize)]
struct SrcFilesDoc {
    #[serde(default)]
    result: Vec<HashEntry>,
    #[serde(default)]
    fileinfo: BTreeMap<String, Vec<FileInfo>>,
}

#[derive(Debug, Deserialize)]
struct HashEntry {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    name: String,
    #[serde(default)]
    first_seen: Option<String>,
}

/// snapshot timestamps look like `20230210T100000Z`.
fn parse_snapshot_time(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%SZ")
        .ok()
        .map(|naive| naive.and_utc())
}

impl DebianRegistry {
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

    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        self.ctx.limiter.acquire(Ecosystem::Debian).await;
        let body = self.ctx.net.get_bytes(url).await?;
        serde_json::from_slice(&body).map_err(|e| {
            RegistryError::Malformed {
                message: format!("snapshot.debian.org {what}: {e}"),
            }
            .into()
        })
    }

    /// The `.dsc` file hash for a version, with its first-seen instant.
    async fn dsc_entry(
        &self,
        package: &str,
        version: &str,
    ) -> Result<(String, Option<DateTime<Utc>>)> {
        let url = format!(
            "{}/mr/package/{package}/{version}/srcfiles?fileinfo=1",
            self.base
        );
        let doc: SrcFilesDoc = self.fetch(&url, &format!("{package}@{version}")).await?;
        for entry in &doc.result {
            if let Some(infos) = doc.fileinfo.get(&entry.hash) {
                for info in infos {
                    if info.name.ends_with(".dsc") {
                        let at = info.first_seen.as_deref().and_then(parse_snapshot_time);
                        return Ok((entry.hash.clone(), at));
                    }
                }
            }
        }
        Err(RegistryError::NotFound {
            package: package.to_string(),
            version: Some(version.to_string()),
        }
        .into())
    }

    /// URL of one content-addressed file.
    #[must_use]
    pub fn file_url(&self, hash: &str) -> String {
        format!("{}/file/{hash}", self.base)
    }
}

#[async_trait]
impl RegistryClient for DebianRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Debian
    }

    async fn package(&self, package: &str) -> Result<PackageMeta> {
        let url = format!("{}/mr/package/{package}/", self.base);
        let doc: PackageDoc = self.fetch(&url, package).await?;
        Ok(PackageMeta {
            name: doc.package,
            versions: doc.result.into_iter().map(|v| v.version).collect(),
            upload_times: BTreeMap::new(),
            repository: None,
        })
    }

    async fn version(&self, package: &str, version: &str) -> Result<VersionMeta> {
        let (hash, upload_time) = self.dsc_entry(package, version).await?;
        Ok(VersionMeta {
            repository: None,
            integrity: Some(hash.clone()),
            dist_url: Some(self.file_url(&hash)),
            git_ref: None,
            tool_versions: BTreeMap::new(),
            scripts: BTreeMap::new(),
            upload_time,
        })
    }

    async fn artifact(&self, package: &str, version: &str) -> Result<Bytes> {
        let meta = self.version(package, version).await?;
        let url = meta.dist_url.ok_or_else(|| {
            rebuildr_errors::Error::from(RegistryError::NotFound {
                package: package.to_string(),
                version: Some(version.to_string()),
            })
        })?;
        self.ctx.limiter.acquire(Ecosystem::Debian).await;
        self.ctx.net.get_bytes(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_snapshot_timestamps() {
        let at = parse_snapshot_time("20230210T100000Z").unwrap();
        assert_eq!(at, "2023-02-10T10:00:00Z".parse::<DateTime<Utc>>().unwrap());
        assert!(parse_snapshot_time("not-a-time").is_none());
    }
}
