//! crates.io registry client

use crate::models::{PackageMeta, RepositoryRef, VersionMeta};
use crate::{RegistryClient, RegistryContext};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rebuildr_errors::{RegistryError, Result};
use rebuildr_types::Ecosystem;
use serde::Deserialize;
use std::collections::BTreeMap;

pub const DEFAULT_BASE: &str = "https://crates.io";
pub const DEFAULT_DL_BASE: &str = "https://static.crates.io/crates";

pub struct CratesRegistry {
    ctx: RegistryContext,
    base: String,
    dl_base: String,
}

#[derive(Debug, Deserialize)]
struct CrateDoc {
    #[serde(rename = "crate")]
    krate: CrateInfo,
    #[serde(default)]
    versions: Vec<VersionInfo>,
}

#[derive(Debug, Deserialize)]
struct CrateInfo {
    name: String,
    #[serde(default)]
    repository: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    num: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    checksum: Option<String>,
    #[serde(default)]
    rust_version: Option<String>,
}

impl CratesRegistry {
    #[must_use]
    pub fn new(ctx: RegistryContext) -> Self {
        Self::with_base(ctx, DEFAULT_BASE, DEFAULT_DL_BASE)
    }

    #[must_use]
    pub fn with_base(
        ctx: RegistryContext,
        base: impl Into<String>,
        dl_base: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            base: base.into(),
            dl_base: dl_base.into(),
        }
    }

    async fn fetch_doc(&self, package: &str) -> Result<CrateDoc> {
        self.ctx.limiter.acquire(Ecosystem::CratesIO).await;
        let url = format!("{}/api/v1/crates/{package}", self.base);
        let body = self.ctx.net.get_bytes(&url).await?;
        serde_json::from_slice(&body).map_err(|e| {
            RegistryError::Malformed {
                message: format!("crates.io doc for {package}: {e}"),
            }
            .into()
        })
    }
}

#[async_trait]
impl RegistryClient for CratesRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::CratesIO
    }

    async fn package(&self, package: &str) -> Result<PackageMeta> {
        let doc = self.fetch_doc(package).await?;
        let mut upload_times = BTreeMap::new();
        for v in &doc.versions {
            if let Some(at) = v.created_at {
                upload_times.insert(v.num.clone(), at);
            }
        }
        Ok(PackageMeta {
            name: doc.krate.name,
            versions: doc.versions.into_iter().map(|v| v.num).collect(),
            upload_times,
            repository: doc.krate.repository.map(|url| RepositoryRef {
                url,
                directory: None,
            }),
        })
    }

    async fn version(&self, package: &str, version: &str) -> Result<VersionMeta> {
        let doc = self.fetch_doc(package).await?;
        let info = doc
            .versions
            .iter()
            .find(|v| v.num == version)
            .ok_or_else(|| {
                rebuildr_errors::Error::from(RegistryError::NotFound {
                    package: package.to_string(),
                    version: Some(version.to_string()),
                })
            })?;

        let mut tool_versions = BTreeMap::new();
        if let Some(rust) = &info.rust_version {
            tool_versions.insert("rust".to_string(), rust.clone());
        }

        Ok(VersionMeta {
            repository: doc.krate.repository.clone().map(|url| RepositoryRef {
                url,
                directory: None,
            }),
            integrity: info.checksum.clone(),
            dist_url: Some(format!(
                "{}/{package}/{package}-{version}.crate",
                self.dl_base
            )),
            git_ref: None,
            tool_versions,
            scripts: BTreeMap::new(),
            upload_time: info.created_at,
        })
    }

    async fn artifact(&self, package: &str, version: &str) -> Result<Bytes> {
        self.ctx.limiter.acquire(Ecosystem::CratesIO).await;
        let url = format!("{}/{package}/{package}-{version}.crate", self.dl_base);
        self.ctx.net.get_bytes(&url).await
    }
}
