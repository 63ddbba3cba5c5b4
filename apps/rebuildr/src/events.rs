//! Event rendering for the CLI
//!
//! The only consumer that prints. Everything else communicates through
//! the event channel.

use rebuildr_events::{
    AppEvent, AssetEvent, BuildStageEvent, CompareEvent, EventReceiver, GeneralEvent,
    PipelineEvent, RegistryEvent,
};
use tracing::{debug, info, warn};

/// Drain the event channel, rendering progress until it closes.
pub async fn drive(mut receiver: EventReceiver) {
    while let Some(event) = receiver.recv().await {
        render(&event);
    }
}

fn render(event: &AppEvent) {
    match event {
        AppEvent::General(GeneralEvent::Debug { message }) => debug!("{message}"),
        AppEvent::General(GeneralEvent::Warning { message }) => warn!("{message}"),
        AppEvent::General(GeneralEvent::Error { message }) => warn!("{message}"),
        AppEvent::Pipeline(event) => render_pipeline(event),
        AppEvent::Registry(RegistryEvent::Fetching { ecosystem, url }) => {
            debug!(%ecosystem, %url, "fetching");
        }
        AppEvent::Registry(RegistryEvent::ArtifactFetched { target, bytes }) => {
            debug!(%target, bytes, "upstream artifact fetched");
        }
        AppEvent::Registry(RegistryEvent::RateLimited { ecosystem, waited }) => {
            debug!(%ecosystem, ?waited, "rate limited");
        }
        AppEvent::Build(BuildStageEvent::ScriptStarted { target, step }) => {
            debug!(%target, %step, "script started");
        }
        AppEvent::Build(BuildStageEvent::ScriptCompleted {
            target,
            step,
            exit_code,
        }) => {
            debug!(%target, %step, exit_code, "script completed");
        }
        AppEvent::Build(BuildStageEvent::ArtifactProduced { target, path }) => {
            debug!(%target, %path, "artifact produced");
        }
        AppEvent::Compare(CompareEvent::Summarized {
            target,
            upstream_files,
            rebuild_files,
        }) => {
            debug!(%target, upstream_files, rebuild_files, "archives summarized");
        }
        AppEvent::Compare(CompareEvent::Classified { target, message }) => {
            info!(%target, %message, "comparison classified");
        }
        AppEvent::Asset(AssetEvent::Stored {
            target,
            kind,
            bytes,
        }) => {
            debug!(%target, %kind, bytes, "asset stored");
        }
    }
}

fn render_pipeline(event: &PipelineEvent) {
    match event {
        PipelineEvent::RunStarted {
            run_id,
            target_count,
        } => info!(%run_id, target_count, "run started"),
        PipelineEvent::TargetStarted { target } => info!(%target, "target started"),
        PipelineEvent::StageStarted { target, stage } => debug!(%target, %stage, "stage started"),
        PipelineEvent::StageCompleted {
            target,
            stage,
            duration,
        } => debug!(%target, %stage, ?duration, "stage completed"),
        PipelineEvent::TargetRetried { target, reason } => {
            warn!(%target, %reason, "target retried");
        }
        PipelineEvent::TargetCompleted { verdict } => {
            if verdict.success {
                info!(target = %verdict.target, "reproduced");
            } else {
                info!(target = %verdict.target, message = %verdict.message, "not reproduced");
            }
        }
        PipelineEvent::RunCompleted {
            run_id,
            successes,
            failures,
        } => info!(%run_id, successes, failures, "run completed"),
    }
}
