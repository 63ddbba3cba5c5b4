//! rebuildr - rebuild published packages from source and compare
//!
//! Exit codes: 0 on success, 1 on any non-success verdict, 2 on
//! internal error.

mod cli;
mod events;
mod export;

use crate::cli::{Cli, Commands, TargetArgs};
use chrono::Utc;
use clap::Parser;
use rebuildr_config::Config;
use rebuildr_errors::{Error, Result};
use rebuildr_pipeline::{run_benchmark, LocalBuilder, RebuildPipeline};
use rebuildr_rundex::{LocalRundex, Run, RundexWriter};
use rebuildr_store::FilesystemAssetStore;
use rebuildr_types::{RunType, Target};
use std::process;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.debug);

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("internal error: {e}");
            eprintln!("Error: {e}");
            process::exit(2);
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = Config::load_or_default(&cli.global.config).await?;
    config.merge_env();

    match cli.command {
        Commands::Smoketest(args) => run_single(config, &args, RunType::Smoketest).await,
        Commands::Rebuild(args) => run_single(config, &args, RunType::Attest).await,
        Commands::Benchmark {
            benchfile,
            concurrency,
            attest,
        } => {
            let body = tokio::fs::read_to_string(&benchfile)
                .await
                .map_err(|e| Error::io_with_path(&e, &benchfile))?;
            let run_type = if attest {
                RunType::Attest
            } else {
                RunType::Smoketest
            };
            let concurrency = concurrency.unwrap_or(match run_type {
                RunType::Attest => config.pipeline.attest_concurrency,
                RunType::Smoketest => config.pipeline.smoketest_concurrency,
            });
            let name = benchfile
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| benchfile.display().to_string());

            let (pipeline, rundex, events_task) = assemble(config)?;
            let outcome = run_benchmark(
                pipeline.clone(),
                rundex,
                &name,
                &body,
                run_type,
                concurrency,
                |verdict| {
                    if verdict.success {
                        println!("PASS {}", verdict.target);
                    } else {
                        println!("FAIL {} ({})", verdict.target, verdict.message);
                    }
                },
            )
            .await?;
            drop(pipeline);
            let _ = events_task.await;

            println!(
                "run {}: {}/{} reproduced",
                outcome.run_id,
                outcome.successes,
                outcome.total()
            );
            Ok(i32::from(outcome.failures > 0))
        }
        Commands::Export { run, destination } => {
            export::export_run(&config, &run, &destination).await?;
            println!("exported run {run} to {}", destination.display());
            Ok(0)
        }
    }
}

type Assembled = (
    Arc<RebuildPipeline>,
    Arc<LocalRundex>,
    tokio::task::JoinHandle<()>,
);

/// Wire the pipeline, stores, and event printer together.
fn assemble(config: Config) -> Result<Assembled> {
    let (tx, rx) = rebuildr_events::channel();
    let events_task = tokio::spawn(events::drive(rx));

    let builder = Arc::new(LocalBuilder::new(config.paths.asset_root.join("build")));
    let assets = Arc::new(FilesystemAssetStore::new(&config.paths.asset_root));
    let rundex = Arc::new(LocalRundex::new(&config.paths.rundex_root));
    let pipeline = Arc::new(
        RebuildPipeline::new(config, builder, assets, rundex.clone())?.with_events(tx),
    );
    Ok((pipeline, rundex, events_task))
}

async fn run_single(mut config: Config, args: &TargetArgs, run_type: RunType) -> Result<i32> {
    // Smoketests publish nothing: assets and records go to scratch.
    let _scratch = if run_type == RunType::Smoketest {
        let dir = tempfile::tempdir()?;
        config.paths.asset_root = dir.path().to_path_buf();
        config.paths.rundex_root = dir.path().to_path_buf();
        Some(dir)
    } else {
        None
    };

    let mut target = Target::new(args.ecosystem, args.package.clone(), args.version.clone())?;
    if let Some(artifact) = &args.artifact {
        target.set_artifact(artifact.clone())?;
    }

    let (pipeline, rundex, events_task) = assemble(config)?;
    let run = Run {
        id: Uuid::new_v4().to_string(),
        benchmark_name: String::new(),
        benchmark_hash: String::new(),
        run_type,
        created: Utc::now(),
    };
    rundex.write_run(&run).await?;

    let verdict = pipeline.run_target(target, &run).await;
    drop(pipeline);
    let _ = events_task.await;

    if verdict.success {
        println!("PASS {}", verdict.target);
        Ok(0)
    } else {
        println!("FAIL {} ({})", verdict.target, verdict.message);
        Ok(1)
    }
}
