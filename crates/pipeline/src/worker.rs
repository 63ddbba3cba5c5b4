//! The worker pool and benchmark runner
//!
//! A dispatcher feeds targets to a bounded pool; workers run one target
//! to completion before pulling the next. Verdicts are emitted onto the
//! output channel in completion order, and the channel closes when all
//! targets have terminated.

use crate::pipeline::RebuildPipeline;
use chrono::Utc;
use futures::StreamExt;
use rebuildr_errors::Result;
use rebuildr_events::{AppEvent, EventEmitter, PipelineEvent};
use rebuildr_hash::Hash;
use rebuildr_rundex::{Run, RundexWriter};
use rebuildr_types::{BenchmarkSet, RunType, Target, Verdict};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Aggregate counts for a finished run.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkOutcome {
    pub run_id: String,
    pub successes: usize,
    pub failures: usize,
}

impl BenchmarkOutcome {
    #[must_use]
    pub fn total(&self) -> usize {
        self.successes + self.failures
    }
}

/// Run targets through the pipeline with bounded concurrency, sending
/// verdicts in completion order. The receiver sees the channel close
/// once every target has terminated.
pub async fn run_targets(
    pipeline: Arc<RebuildPipeline>,
    run: Run,
    targets: Vec<Target>,
    concurrency: usize,
    verdicts: mpsc::Sender<Verdict>,
) {
    let run = Arc::new(run);
    let mut stream = futures::stream::iter(targets.into_iter().map(|target| {
        let pipeline = Arc::clone(&pipeline);
        let run = Arc::clone(&run);
        async move { pipeline.run_target(target, &run).await }
    }))
    .buffer_unordered(concurrency.max(1));

    while let Some(verdict) = stream.next().await {
        if verdicts.send(verdict).await.is_err() {
            // Receiver gone; nothing left to report to.
            break;
        }
    }
    // Dropping the sender closes the channel.
}

/// Load a benchmark, register the run, and push every target through
/// the pipeline.
///
/// # Errors
///
/// Returns an error when the benchmark cannot be parsed or the run
/// cannot be registered; per-target failures are verdicts, not errors.
pub async fn run_benchmark(
    pipeline: Arc<RebuildPipeline>,
    rundex: Arc<dyn RundexWriter>,
    benchmark_name: &str,
    benchmark_body: &str,
    run_type: RunType,
    concurrency: usize,
    mut on_verdict: impl FnMut(&Verdict),
) -> Result<BenchmarkOutcome> {
    let set = BenchmarkSet::from_json(benchmark_body)?;
    let targets = set.targets()?;

    let run = Run {
        id: Uuid::new_v4().to_string(),
        benchmark_name: benchmark_name.to_string(),
        benchmark_hash: Hash::from_data(benchmark_body.as_bytes()).to_hex(),
        run_type,
        created: Utc::now(),
    };
    rundex.write_run(&run).await?;

    pipeline.emit(AppEvent::Pipeline(PipelineEvent::RunStarted {
        run_id: run.id.clone(),
        target_count: targets.len(),
    }));

    let (tx, mut rx) = mpsc::channel(concurrency.max(1) * 2);
    let worker = tokio::spawn(run_targets(
        Arc::clone(&pipeline),
        run.clone(),
        targets,
        concurrency,
        tx,
    ));

    let mut outcome = BenchmarkOutcome {
        run_id: run.id.clone(),
        ..BenchmarkOutcome::default()
    };
    while let Some(verdict) = rx.recv().await {
        if verdict.success {
            outcome.successes += 1;
        } else {
            outcome.failures += 1;
        }
        on_verdict(&verdict);
    }
    // The worker task ends once its sender is dropped.
    let _ = worker.await;

    pipeline.emit(AppEvent::Pipeline(PipelineEvent::RunCompleted {
        run_id: run.id.clone(),
        successes: outcome.successes,
        failures: outcome.failures,
    }));
    Ok(outcome)
}
