#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Strategy inference
//!
//! Per-ecosystem logic that combines registry hints and repository
//! evidence into a [`Strategy`]. All ecosystems follow the same
//! three-step pattern: locate the manifest, resolve the ref, shape the
//! strategy.

pub mod cratesio;
pub mod debian;
pub mod golang;
pub mod manifest;
pub mod maven;
pub mod npm;
pub mod pypi;
pub mod refs;

pub use manifest::{locate_manifest, ManifestInfo};
pub use refs::{resolve_ref, RefHeuristic, RefResolution};

use rebuildr_registry::{PackageMeta, VersionMeta};
use rebuildr_repo::RepoHandle;
use rebuildr_types::{Ecosystem, Location, Strategy, Target};

/// Registry metadata the pipeline prefetched for one target.
#[derive(Debug, Clone, Default)]
pub struct RegistryEvidence {
    pub package: PackageMeta,
    pub version: VersionMeta,
}

impl RegistryEvidence {
    /// The repository URL to clone: version-level pointer first,
    /// package-level second.
    #[must_use]
    pub fn repo_url(&self) -> Option<String> {
        self.version
            .repository
            .as_ref()
            .or(self.package.repository.as_ref())
            .map(rebuildr_registry::RepositoryRef::normalized_url)
    }

    /// Subdirectory recorded alongside the repository pointer.
    #[must_use]
    pub fn repo_directory(&self) -> Option<&str> {
        self.version
            .repository
            .as_ref()
            .and_then(|r| r.directory.as_deref())
    }
}

/// One ecosystem's inference engine.
///
/// Repository operations are blocking (libgit2); callers run inference
/// on a blocking task.
pub trait Rebuilder: Send + Sync {
    fn ecosystem(&self) -> Ecosystem;

    /// Infer a strategy for `target` from registry evidence and the
    /// cloned repository. A [`Strategy::LocationHint`] passed by the
    /// caller forces the location but still runs normal inference.
    fn infer(
        &self,
        target: &Target,
        evidence: &RegistryEvidence,
        repo: Option<&RepoHandle>,
        hint: Option<&Location>,
    ) -> rebuildr_errors::Result<Strategy>;
}

/// The inference engine for an ecosystem.
#[must_use]
pub fn rebuilder_for(ecosystem: Ecosystem) -> Box<dyn Rebuilder> {
    match ecosystem {
        Ecosystem::Npm => Box::new(npm::NpmRebuilder),
        Ecosystem::PyPI => Box::new(pypi::PypiRebuilder),
        Ecosystem::CratesIO => Box::new(cratesio::CratesRebuilder),
        Ecosystem::Debian => Box::new(debian::DebianRebuilder),
        Ecosystem::Maven => Box::new(maven::MavenRebuilder),
        Ecosystem::Go => Box::new(golang::GoRebuilder),
    }
}
