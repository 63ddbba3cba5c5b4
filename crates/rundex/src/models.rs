//! Rundex record types

use chrono::{DateTime, Utc};
use rebuildr_types::{RunType, Strategy, Target, Timings, Verdict};
use serde::{Deserialize, Serialize};

/// One orchestrated run over a set of targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub benchmark_name: String,
    pub benchmark_hash: String,
    #[serde(rename = "type")]
    pub run_type: RunType,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created: DateTime<Utc>,
}

/// The persisted form of a verdict plus executor identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildAttempt {
    pub target: Target,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    #[serde(default)]
    pub timings: Timings,
    pub executor_version: String,
    pub run_id: String,
}

/// An attempt with its insertion instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rebuild {
    #[serde(flatten)]
    pub attempt: RebuildAttempt,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created: DateTime<Utc>,
}

impl Rebuild {
    /// Persisted form of a verdict.
    #[must_use]
    pub fn from_verdict(verdict: &Verdict, executor_version: impl Into<String>) -> Self {
        Self {
            attempt: RebuildAttempt {
                target: verdict.target.clone(),
                success: verdict.success,
                message: verdict.message.clone(),
                strategy: verdict.strategy.clone(),
                timings: verdict.timings,
                executor_version: executor_version.into(),
                run_id: verdict.run_id.clone(),
            },
            created: verdict.created,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebuildr_types::Ecosystem;

    #[test]
    fn run_created_is_millisecond_epoch() {
        let run = Run {
            id: "run-1".to_string(),
            benchmark_name: "smoke.json".to_string(),
            benchmark_hash: "abc".to_string(),
            run_type: RunType::Smoketest,
            created: "2023-02-10T10:00:00Z".parse().unwrap(),
        };
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["created"].as_i64().unwrap(), 1_676_023_200_000);
        assert_eq!(json["type"], "smoketest");
    }

    #[test]
    fn rebuild_embeds_attempt_fields() {
        let target = Target::new(Ecosystem::Npm, "left-pad", "1.3.0").unwrap();
        let verdict = Verdict::success(
            target,
            "run-1",
            None,
            Timings::default(),
            Utc::now(),
        );
        let rebuild = Rebuild::from_verdict(&verdict, "rebuildr/0.1.0");
        let json = serde_json::to_value(&rebuild).unwrap();
        // flattened attempt fields sit at the top level
        assert_eq!(json["run_id"], "run-1");
        assert_eq!(json["executor_version"], "rebuildr/0.1.0");
    }
}
