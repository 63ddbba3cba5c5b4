#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! The rebuild orchestration pipeline
//!
//! Walks each target through infer → fetch upstream → build → stabilize
//! → compare, records timings and assets, and emits a verdict. Targets
//! run in parallel under a bounded worker pool; `Transient` failures
//! get exactly one retry.

mod builder;
mod pipeline;
mod worker;

pub use builder::{BuildOutput, Builder, LocalBuilder};
pub use pipeline::{RebuildPipeline, Stage};
pub use worker::{run_benchmark, run_targets, BenchmarkOutcome};
