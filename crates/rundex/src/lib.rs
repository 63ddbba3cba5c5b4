#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! The rundex: indexed storage of runs and per-target rebuild attempts
//!
//! Runs are immutable once written; rebuild writes are idempotent on
//! `(run_id, target)`. Readers expose filtered fetches (by run, by
//! verdict-message prefix or pattern) and latest-per-package
//! deduplication.

mod local;
mod models;

pub use local::LocalRundex;
pub use models::{Rebuild, RebuildAttempt, Run};

use async_trait::async_trait;
use rebuildr_errors::Result;

/// Filters for rebuild fetches.
#[derive(Debug, Clone, Default)]
pub struct FetchRebuildOpts {
    /// Restrict to these runs; empty means all runs.
    pub run_ids: Vec<String>,
    /// Keep only rebuilds whose message starts with this prefix.
    pub message_prefix: Option<String>,
    /// Keep only rebuilds whose message matches this regex.
    pub message_pattern: Option<String>,
    /// Keep only the newest attempt per distinct target.
    pub latest_per_package: bool,
}

/// Write access to the rundex.
#[async_trait]
pub trait RundexWriter: Send + Sync {
    /// Record a run. Runs are immutable; rewriting the same id is a
    /// no-op.
    async fn write_run(&self, run: &Run) -> Result<()>;

    /// Record a rebuild attempt, idempotent on `(run_id, target)`.
    async fn write_rebuild(&self, rebuild: &Rebuild) -> Result<()>;
}

/// Read access to the rundex.
#[async_trait]
pub trait RundexReader: Send + Sync {
    /// All recorded runs, oldest first.
    async fn runs(&self) -> Result<Vec<Run>>;

    /// Rebuilds matching the filters.
    async fn rebuilds(&self, opts: &FetchRebuildOpts) -> Result<Vec<Rebuild>>;
}
