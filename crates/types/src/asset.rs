//! Asset identification
//!
//! Assets are opaque blobs keyed by `(run_id, target, kind)`; the store
//! turns the key into a URL-locatable path so external tools (diffoscope
//! and friends) can reach them out-of-band.

use crate::target::Target;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of blobs a rebuild attempt produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// The artifact as served by the registry.
    UpstreamArtifact,
    /// The artifact our build produced.
    RebuildArtifact,
    /// JSON build metadata (strategy, hashes, timings, executor).
    BuildInfo,
    /// Combined stdout/stderr of the build scripts.
    BuildLogs,
    /// Pre-stabilization copies kept for debugging.
    DebugUpstream,
    /// Pre-stabilization copy of the rebuild.
    DebugRebuild,
    /// The container definition the build ran under.
    Dockerfile,
    /// YAML rendering of the strategy.
    BuildDefinition,
    /// Unified diff of the stabilized archives.
    Diff,
}

impl AssetKind {
    /// Path component used by the filesystem store layout.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::UpstreamArtifact => "upstream",
            AssetKind::RebuildArtifact => "rebuild",
            AssetKind::BuildInfo => "info.json",
            AssetKind::BuildLogs => "build.log",
            AssetKind::DebugUpstream => "debug_upstream",
            AssetKind::DebugRebuild => "debug_rebuild",
            AssetKind::Dockerfile => "Dockerfile",
            AssetKind::BuildDefinition => "build.yaml",
            AssetKind::Diff => "diff",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Key of one stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub target: Target,
    pub kind: AssetKind,
}

impl Asset {
    #[must_use]
    pub fn new(target: Target, kind: AssetKind) -> Self {
        Self { target, kind }
    }
}
