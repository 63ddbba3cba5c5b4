//! Domain-grouped event definitions

use rebuildr_types::{AssetKind, Ecosystem, Target, Verdict};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// General diagnostics not tied to a domain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeneralEvent {
    Debug { message: String },
    Warning { message: String },
    Error { message: String },
}

impl GeneralEvent {
    #[must_use]
    pub fn debug(message: impl Into<String>) -> Self {
        Self::Debug {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Pipeline lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    RunStarted {
        run_id: String,
        target_count: usize,
    },
    TargetStarted {
        target: Target,
    },
    StageStarted {
        target: Target,
        stage: String,
    },
    StageCompleted {
        target: Target,
        stage: String,
        duration: Duration,
    },
    TargetRetried {
        target: Target,
        reason: String,
    },
    TargetCompleted {
        verdict: Box<Verdict>,
    },
    RunCompleted {
        run_id: String,
        successes: usize,
        failures: usize,
    },
}

/// Registry client events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RegistryEvent {
    Fetching {
        ecosystem: Ecosystem,
        url: String,
    },
    ArtifactFetched {
        target: Target,
        bytes: u64,
    },
    RateLimited {
        ecosystem: Ecosystem,
        waited: Duration,
    },
}

/// Build execution events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BuildStageEvent {
    ScriptStarted {
        target: Target,
        step: String,
    },
    ScriptCompleted {
        target: Target,
        step: String,
        exit_code: i32,
    },
    ArtifactProduced {
        target: Target,
        path: String,
    },
}

/// Comparison events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CompareEvent {
    Summarized {
        target: Target,
        upstream_files: usize,
        rebuild_files: usize,
    },
    Classified {
        target: Target,
        message: String,
    },
}

/// Asset store events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssetEvent {
    Stored {
        target: Target,
        kind: AssetKind,
        bytes: u64,
    },
}

/// Top-level event type carried on the channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event")]
pub enum AppEvent {
    General(GeneralEvent),
    Pipeline(PipelineEvent),
    Registry(RegistryEvent),
    Build(BuildStageEvent),
    Compare(CompareEvent),
    Asset(AssetEvent),
}
