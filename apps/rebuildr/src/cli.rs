//! Command line definitions

use clap::{Args, Parser, Subcommand};
use rebuildr_types::Ecosystem;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "rebuildr", version, about = "Rebuild published packages from source and compare")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "rebuildr.toml")]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Package ecosystem (npm, pypi, cratesio, debian, maven, go)
    pub ecosystem: Ecosystem,

    /// Package name
    pub package: String,

    /// Package version
    pub version: String,

    /// Artifact name; guessed when omitted
    #[arg(long)]
    pub artifact: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build one target locally and report the verdict; publish nothing
    Smoketest(TargetArgs),

    /// Build one target and publish its assets and rundex record
    Rebuild(TargetArgs),

    /// Run every target of a benchmark file
    Benchmark {
        /// Path to the benchmark JSON file
        benchfile: PathBuf,

        /// Worker count; defaults from config by mode
        #[arg(long)]
        concurrency: Option<usize>,

        /// Publish assets (attest mode) instead of smoketesting
        #[arg(long)]
        attest: bool,
    },

    /// Copy one run's records and assets to a destination directory
    Export {
        /// Run id to export
        #[arg(long)]
        run: String,

        /// Destination directory
        #[arg(long)]
        destination: PathBuf,
    },
}
