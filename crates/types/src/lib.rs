#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for rebuildr
//!
//! This crate provides the fundamental types used throughout the system:
//! build targets, strategies, rendered build instructions, verdicts, and
//! the benchmark file model.

pub mod asset;
pub mod benchmark;
pub mod instructions;
pub mod strategy;
pub mod target;
pub mod timewarp;
pub mod verdict;
pub mod version;

// Re-export commonly used types
pub use asset::{Asset, AssetKind};
pub use benchmark::{BenchmarkPackage, BenchmarkSet};
pub use instructions::{BuildEnv, Instructions};
pub use strategy::{FlowStep, Location, Strategy};
pub use target::{Ecosystem, Target};
pub use timewarp::timewarp_url;
pub use verdict::{RunType, Timings, Verdict};

pub use semver::Version;
pub use uuid::Uuid;
