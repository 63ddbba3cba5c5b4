#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Per-ecosystem registry clients
//!
//! Each client exposes the same three operations: package-level
//! metadata (version list, upload times, repository URL), version-level
//! metadata (build hints, dist URL, integrity), and the upstream
//! artifact bytes. Failures map uniformly: 404 is `NotFound`, network
//! and 5xx are `Transient` (retryable), decode errors are `Malformed`.

pub mod cratesio;
pub mod debian;
pub mod golang;
pub mod maven;
pub mod models;
pub mod npm;
pub mod pypi;

pub use models::{PackageMeta, RepositoryRef, VersionMeta};

use async_trait::async_trait;
use bytes::Bytes;
use rebuildr_errors::Result;
use rebuildr_net::{NetClient, RegistryLimiter};
use rebuildr_types::{Ecosystem, Target};
use std::sync::Arc;

/// The three operations the core needs from any registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Which ecosystem this client talks to.
    fn ecosystem(&self) -> Ecosystem;

    /// Package-level metadata: version set, upload times, repository.
    async fn package(&self, package: &str) -> Result<PackageMeta>;

    /// Version-level metadata: build hints, dist URL, integrity.
    async fn version(&self, package: &str, version: &str) -> Result<VersionMeta>;

    /// The artifact bytes as served by the registry.
    async fn artifact(&self, package: &str, version: &str) -> Result<Bytes>;
}

/// Shared pieces every client holds.
#[derive(Clone)]
pub struct RegistryContext {
    pub net: NetClient,
    pub limiter: Arc<RegistryLimiter>,
}

impl RegistryContext {
    #[must_use]
    pub fn new(net: NetClient, limiter: Arc<RegistryLimiter>) -> Self {
        Self { net, limiter }
    }
}

/// Construct the client for an ecosystem against its public registry.
#[must_use]
pub fn client_for(ecosystem: Ecosystem, ctx: RegistryContext) -> Box<dyn RegistryClient> {
    match ecosystem {
        Ecosystem::Npm => Box::new(npm::NpmRegistry::new(ctx)),
        Ecosystem::PyPI => Box::new(pypi::PypiRegistry::new(ctx)),
        Ecosystem::CratesIO => Box::new(cratesio::CratesRegistry::new(ctx)),
        Ecosystem::Debian => Box::new(debian::DebianRegistry::new(ctx)),
        Ecosystem::Maven => Box::new(maven::MavenRegistry::new(ctx)),
        Ecosystem::Go => Box::new(golang::GoProxyRegistry::new(ctx)),
    }
}

/// The artifact filename a registry serves for a target, before any
/// registry round-trip. npm sanitizes scoped names (`@scope/pkg` becomes
/// `scope-pkg`); pypi normalizes to wheel naming.
#[must_use]
pub fn guess_artifact(target: &Target) -> String {
    match target.ecosystem {
        Ecosystem::Npm => {
            let sanitized = target.package.trim_start_matches('@').replace('/', "-");
            format!("{sanitized}-{}.tgz", target.version)
        }
        Ecosystem::PyPI => {
            let normalized = target.package.replace(['-', '.'], "_").to_lowercase();
            format!("{normalized}-{}-py3-none-any.whl", target.version)
        }
        Ecosystem::CratesIO => format!("{}-{}.crate", target.package, target.version),
        Ecosystem::Debian => format!("{}_{}_amd64.deb", target.package, target.version),
        Ecosystem::Maven => {
            let artifact_id = target
                .package
                .rsplit(':')
                .next()
                .unwrap_or(&target.package);
            format!("{artifact_id}-{}.jar", target.version)
        }
        Ecosystem::Go => format!("{}.zip", target.version),
    }
}
