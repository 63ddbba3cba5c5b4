//! npm registry client (registry.npmjs.org)

use crate::models::{PackageMeta, RepositoryRef, VersionMeta};
use crate::{RegistryClient, RegistryContext};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rebuildr_errors::{RegistryError, Result};
use rebuildr_types::Ecosystem;
use serde::Deserialize;
use std::collections::BTreeMap;

pub const DEFAULT_BASE: &str = "https://registry.npmjs.org";

pub struct NpmRegistry {
    ctx: RegistryContext,
    base: String,
}

#[derive(Debug, Deserialize)]
struct PackageDoc {
    name: String,
    #[serde(default)]
    versions: BTreeMap<String, VersionDoc>,
    #[serde(default)]
    time: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    repository: Option<RepositoryRef>,
}

#[derive(Debug, Deserialize)]
struct VersionDoc {
    #[serde(default)]
    repository: Option<RepositoryRef>,
    #[serde(rename = "gitHead", default)]
    git_head: Option<String>,
    #[serde(rename = "_npmVersion", default)]
    npm_version: Option<String>,
    #[serde(rename = "_nodeVersion", default)]
    node_version: Option<String>,
    #[serde(default)]
    scripts: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    dist: Option<DistDoc>,
}

#[derive(Debug, Deserialize)]
struct DistDoc {
    #[serde(default)]
    tarball: Option<String>,
    #[serde(default)]
    integrity: Option<String>,
    #[serde(default)]
    shasum: Option<String>,
}

impl NpmRegistry {
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

    /// Scoped names keep their `@` but escape the separating slash.
    fn encode_package(package: &str) -> String {
        package.replacen('/', "%2F", 1)
    }

    async fn fetch_doc(&self, package: &str) -> Result<PackageDoc> {
        self.ctx.limiter.acquire(Ecosystem::Npm).await;
        let url = format!("{}/{}", self.base, Self::encode_package(package));
        let body = self.ctx.net.get_bytes(&url).await?;
        serde_json::from_slice(&body).map_err(|e| {
            RegistryError::Malformed {
                message: format!("npm package doc for {package}: {e}"),
            }
            .into()
        })
    }

    fn version_meta(doc: &PackageDoc, package: &str, version: &str) -> Result<VersionMeta> {
        let vdoc = doc.versions.get(version).ok_or_else(|| {
            rebuildr_errors::Error::from(RegistryError::NotFound {
                package: package.to_string(),
                version: Some(version.to_string()),
            })
        })?;

        let mut tool_versions = BTreeMap::new();
        if let Some(npm) = &vdoc.npm_version {
            tool_versions.insert("npm".to_string(), npm.clone());
        }
        if let Some(node) = &vdoc.node_version {
            tool_versions.insert("node".to_string(), node.clone());
        }

        // Script values are occasionally non-string in old manifests;
        // keep whatever stringifies.
        let scripts = vdoc
            .scripts
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect();

        let dist = vdoc.dist.as_ref();
        Ok(VersionMeta {
            repository: vdoc.repository.clone().or_else(|| doc.repository.clone()),
            integrity: dist.and_then(|d| d.integrity.clone().or_else(|| d.shasum.clone())),
            dist_url: dist.and_then(|d| d.tarball.clone()),
            git_ref: vdoc.git_head.clone(),
            tool_versions,
            scripts,
            upload_time: doc.time.get(version).copied(),
        })
    }
}

#[async_trait]
impl RegistryClient for NpmRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }

    async fn package(&self, package: &str) -> Result<PackageMeta> {
        let doc = self.fetch_doc(package).await?;
        let versions: Vec<String> = doc.versions.keys().cloned().collect();
        let upload_times = doc
            .time
            .iter()
            .filter(|(k, _)| doc.versions.contains_key(*k))
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        Ok(PackageMeta {
            name: doc.name,
            versions,
            upload_times,
            repository: doc.repository,
        })
    }

    async fn version(&self, package: &str, version: &str) -> Result<VersionMeta> {
        let doc = self.fetch_doc(package).await?;
        Self::version_meta(&doc, package, version)
    }

    async fn artifact(&self, package: &str, version: &str) -> Result<Bytes> {
        let meta = self.version(package, version).await?;
        let url = meta.dist_url.ok_or_else(|| {
            rebuildr_errors::Error::from(RegistryError::Malformed {
                message: format!("npm {package}@{version} has no dist.tarball"),
            })
        })?;
        self.ctx.limiter.acquire(Ecosystem::Npm).await;
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

    const DOC: &str = r#"{
        "name": "test-package",
        "versions": {
            "1.0.0": {
                "name": "test-package",
                "version": "1.0.0",
                "gitHead": "deadbeef",
                "_npmVersion": "8.1.2",
                "_nodeVersion": "16.13.0",
                "scripts": {"build": "tsc"},
                "repository": "git+https://github.com/test/test-package.git",
                "dist": {
                    "tarball": "https://registry.npmjs.org/test-package/-/test-package-1.0.0.tgz",
                    "integrity": "sha512-abc"
                }
            }
        },
        "time": {
            "created": "2023-01-01T00:00:00Z",
            "1.0.0": "2023-02-10T10:00:00Z"
        }
    }"#;

    #[tokio::test]
    async fn decodes_package_and_version() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/test-package");
            then.status(200).body(DOC);
        });

        let registry = NpmRegistry::with_base(ctx(), server.base_url());
        let pkg = registry.package("test-package").await.unwrap();
        assert_eq!(pkg.versions, vec!["1.0.0"]);
        // the `created` pseudo-entry in `time` must not leak in
        assert_eq!(pkg.upload_times.len(), 1);

        let ver = registry.version("test-package", "1.0.0").await.unwrap();
        assert_eq!(ver.git_ref.as_deref(), Some("deadbeef"));
        assert_eq!(ver.tool_versions["npm"], "8.1.2");
        assert_eq!(ver.scripts["build"], "tsc");
        assert_eq!(
            ver.repository.unwrap().normalized_url(),
            "https://github.com/test/test-package.git"
        );
    }

    #[tokio::test]
    async fn missing_version_is_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/test-package");
            then.status(200).body(DOC);
        });

        let registry = NpmRegistry::with_base(ctx(), server.base_url());
        let err = registry
            .version("test-package", "9.9.9")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), rebuildr_errors::ErrorKind::NotFound);
    }
}
