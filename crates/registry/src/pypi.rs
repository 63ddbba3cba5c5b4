//! PyPI registry client (pypi.org JSON API)

use crate::models::{PackageMeta, RepositoryRef, VersionMeta};
use crate::{RegistryClient, RegistryContext};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rebuildr_errors::{RegistryError, Result};
use rebuildr_types::Ecosystem;
use serde::Deserialize;
use std::collections::BTreeMap;

pub const DEFAULT_BASE: &str = "https://pypi.org";

pub struct PypiRegistry {
    ctx: RegistryContext,
    base: String,
}

#[derive(Debug, Deserialize)]
struct ProjectDoc {
    info: InfoDoc,
    #[serde(default)]
    releases: BTreeMap<String, Vec<FileDoc>>,
    #[serde(default)]
    urls: Vec<FileDoc>,
}

#[derive(Debug, Deserialize)]
struct InfoDoc {
    name: String,
    #[serde(default)]
    project_urls: Option<BTreeMap<String, Option<String>>>,
}

#[derive(Debug, Deserialize)]
struct FileDoc {
    filename: String,
    url: String,
    #[serde(default)]
    packagetype: Option<String>,
    #[serde(default)]
    upload_time_iso_8601: Option<DateTime<Utc>>,
    #[serde(default)]
    digests: Option<BTreeMap<String, String>>,
}

/// project_urls keys that typically point at the source repository, in
/// preference order.
const REPO_URL_KEYS: &[&str] = &["Source", "Source Code", "Repository", "Code", "Homepage"];

impl PypiRegistry {
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
        self.ctx.limiter.acquire(Ecosystem::PyPI).await;
        let body = self.ctx.net.get_bytes(url).await?;
        serde_json::from_slice(&body).map_err(|e| {
            RegistryError::Malformed {
                message: format!("pypi {what}: {e}"),
            }
            .into()
        })
    }

    fn repository_of(info: &InfoDoc) -> Option<RepositoryRef> {
        let urls = info.project_urls.as_ref()?;
        for key in REPO_URL_KEYS {
            if let Some(Some(url)) = urls.get(*key) {
                return Some(RepositoryRef {
                    url: url.clone(),
                    directory: None,
                });
            }
        }
        None
    }

    /// Prefer the wheel; fall back to the sdist.
    fn pick_file(files: &[FileDoc]) -> Option<&FileDoc> {
        files
            .iter()
            .find(|f| f.packagetype.as_deref() == Some("bdist_wheel"))
            .or_else(|| files.first())
    }
}

#[async_trait]
impl RegistryClient for PypiRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::PyPI
    }

    async fn package(&self, package: &str) -> Result<PackageMeta> {
        let url = format!("{}/pypi/{package}/json", self.base);
        let doc: ProjectDoc = self.fetch(&url, package).await?;

        let mut upload_times = BTreeMap::new();
        for (version, files) in &doc.releases {
            if let Some(at) = files.iter().filter_map(|f| f.upload_time_iso_8601).min() {
                upload_times.insert(version.clone(), at);
            }
        }

        Ok(PackageMeta {
            name: doc.info.name.clone(),
            versions: doc.releases.keys().cloned().collect(),
            upload_times,
            repository: Self::repository_of(&doc.info),
        })
    }

    async fn version(&self, package: &str, version: &str) -> Result<VersionMeta> {
        let url = format!("{}/pypi/{package}/{version}/json", self.base);
        let doc: ProjectDoc = self.fetch(&url, &format!("{package}@{version}")).await?;

        let file = Self::pick_file(&doc.urls).ok_or_else(|| {
            rebuildr_errors::Error::from(RegistryError::NotFound {
                package: package.to_string(),
                version: Some(version.to_string()),
            })
        })?;

        Ok(VersionMeta {
            repository: Self::repository_of(&doc.info),
            integrity: file
                .digests
                .as_ref()
                .and_then(|d| d.get("sha256").cloned()),
            dist_url: Some(file.url.clone()),
            git_ref: None,
            tool_versions: BTreeMap::new(),
            scripts: BTreeMap::new(),
            upload_time: file.upload_time_iso_8601,
        })
    }

    async fn artifact(&self, package: &str, version: &str) -> Result<Bytes> {
        let meta = self.version(package, version).await?;
        let url = meta.dist_url.ok_or_else(|| {
            rebuildr_errors::Error::from(RegistryError::Malformed {
                message: format!("pypi {package}@{version} has no files"),
            })
        })?;
        self.ctx.limiter.acquire(Ecosystem::PyPI).await;
        self.ctx.net.get_bytes(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use rebuildr_net::{NetClient, RegistryLimiter};
    use std::sync::Arc;

    fn ctx() -> RegistryContext {
        RegistryContext::new(
            NetClient::with_defaults().unwrap(),
            Arc::new(RegistryLimiter::with_defaults()),
        )
    }

    #[tokio::test]
    async fn decodes_version_metadata() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/pypi/six/1.16.0/json");
            then.status(200).body(
                r#"{
                    "info": {
                        "name": "six",
                        "project_urls": {"Source": "https://github.com/benjaminp/six"}
                    },
                    "urls": [{
                        "filename": "six-1.16.0-py2.py3-none-any.whl",
                        "url": "https://files.pythonhosted.org/.../six-1.16.0-py2.py3-none-any.whl",
                        "packagetype": "bdist_wheel",
                        "upload_time_iso_8601": "2021-05-05T14:18:17Z",
                        "digests": {"sha256": "deadbeef"}
                    }]
                }"#,
            );
        });

        let registry = PypiRegistry::with_base(ctx(), server.base_url());
        let meta = registry.version("six", "1.16.0").await.unwrap();
        assert_eq!(
            meta.repository.unwrap().url,
            "https://github.com/benjaminp/six"
        );
        assert_eq!(meta.integrity.as_deref(), Some("deadbeef"));
        assert!(meta.upload_time.is_some());
    }
}
