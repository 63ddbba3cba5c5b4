//! Go module proxy client (proxy.golang.org)

use crate::models::{PackageMeta, RepositoryRef, VersionMeta};
use crate::{RegistryClient, RegistryContext};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rebuildr_errors::{RegistryError, Result};
use rebuildr_types::Ecosystem;
use serde::Deserialize;
use std::collections::BTreeMap;

pub const DEFAULT_BASE: &str = "https://proxy.golang.org";

pub struct GoProxyRegistry {
    ctx: RegistryContext,
    base: String,
}

#[derive(Debug, Deserialize)]
struct InfoDoc {
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "Time", default)]
    time: Option<DateTime<Utc>>,
    #[serde(rename = "Origin", default)]
    origin: Option<OriginDoc>,
}

#[derive(Debug, Deserialize)]
struct OriginDoc {
    #[serde(rename = "URL", default)]
    url: Option<String>,
    #[serde(rename = "Hash", default)]
    hash: Option<String>,
}

/// Module paths are case-encoded on the proxy: every uppercase letter
/// becomes `!` + lowercase.
fn escape_module(module: &str) -> String {
    let mut out = String::with_capacity(module.len());
    for c in module.chars() {
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

impl GoProxyRegistry {
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

    async fn fetch_info(&self, module: &str, version: &str) -> Result<InfoDoc> {
        self.ctx.limiter.acquire(Ecosystem::Go).await;
        let url = format!("{}/{}/@v/{version}.info", self.base, escape_module(module));
        let body = self.ctx.net.get_bytes(&url).await?;
        serde_json::from_slice(&body).map_err(|e| {
            RegistryError::Malformed {
                message: format!("go proxy info for {module}@{version}: {e}"),
            }
            .into()
        })
    }
}

#[async_trait]
impl RegistryClient for GoProxyRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Go
    }

    async fn package(&self, package: &str) -> Result<PackageMeta> {
        self.ctx.limiter.acquire(Ecosystem::Go).await;
        let url = format!("{}/{}/@v/list", self.base, escape_module(package));
        let body = self.ctx.net.get_bytes(&url).await?;
        let text = String::from_utf8(body.to_vec()).map_err(|e| {
            rebuildr_errors::Error::from(RegistryError::Malformed {
                message: format!("go proxy list for {package}: {e}"),
            })
        })?;

        let versions: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect();

        Ok(PackageMeta {
            name: package.to_string(),
            versions,
            upload_times: BTreeMap::new(),
            // Module paths double as repository hosts for the common case.
            repository: Some(RepositoryRef {
                url: format!("https://{package}"),
                directory: None,
            }),
        })
    }

    async fn version(&self, package: &str, version: &str) -> Result<VersionMeta> {
        let info = self.fetch_info(package, version).await?;
        let repository = info
            .origin
            .as_ref()
            .and_then(|o| o.url.clone())
            .map(|url| RepositoryRef {
                url,
                directory: None,
            })
            .or_else(|| {
                Some(RepositoryRef {
                    url: format!("https://{package}"),
                    directory: None,
                })
            });

        Ok(VersionMeta {
            repository,
            integrity: None,
            dist_url: Some(format!(
                "{}/{}/@v/{}.zip",
                self.base,
                escape_module(package),
                info.version
            )),
            git_ref: info.origin.and_then(|o| o.hash),
            tool_versions: BTreeMap::new(),
            scripts: BTreeMap::new(),
            upload_time: info.time,
        })
    }

    async fn artifact(&self, package: &str, version: &str) -> Result<Bytes> {
        self.ctx.limiter.acquire(Ecosystem::Go).await;
        let url = format!("{}/{}/@v/{version}.zip", self.base, escape_module(package));
        self.ctx.net.get_bytes(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_uppercase_path_segments() {
        assert_eq!(
            escape_module("github.com/BurntSushi/toml"),
            "github.com/!burnt!sushi/toml"
        );
        assert_eq!(escape_module("golang.org/x/mod"), "golang.org/x/mod");
    }
}
