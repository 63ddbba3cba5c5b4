//! Rebuild verdicts
//!
//! A verdict is the sole user-visible outcome of one rebuild attempt.
//! Non-success messages come either from the closed comparison set below
//! or carry a pipeline stage tag prefix (`inference: `, `build: `, ...).

use crate::strategy::Strategy;
use crate::target::Target;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Comparison messages. The set is closed: tests and downstream tools
/// match on these strings verbatim.
pub mod messages {
    pub const MISSING_DIST: &str = "dist/ file(s) found in upstream but not rebuild";
    pub const DS_STORE: &str = ".DS_STORE file(s) found in upstream but not rebuild";
    pub const LINE_ENDINGS: &str = "Excess CRLF line endings found in upstream";
    pub const MISMATCHED_FILES: &str = "mismatched file(s) in upstream and rebuild";
    pub const HIDDEN_UPSTREAM_ONLY: &str = "hidden file(s) found in upstream but not rebuild";
    pub const UPSTREAM_ONLY: &str = "file(s) found in upstream but not rebuild";
    pub const REBUILD_ONLY: &str = "file(s) found in rebuild but not upstream";
    pub const PACKAGE_JSON_DIFF: &str = "package.json differences found";
    pub const CONTENT_DIFF: &str = "content differences found";
}

/// What kind of run produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    /// Local build, nothing published.
    Smoketest,
    /// Full run with published artifacts.
    Attest,
}

/// Wall-clock timings of the pipeline stages, serialized as seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Timings {
    #[serde(with = "duration_secs")]
    pub source: Duration,
    #[serde(with = "duration_secs")]
    pub infer: Duration,
    #[serde(with = "duration_secs")]
    pub build: Duration,
    #[serde(with = "duration_secs")]
    pub clone_estimate: Duration,
}

/// Structured outcome of one rebuild attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub target: Target,
    pub run_id: String,
    pub success: bool,
    /// Empty iff `success`.
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    #[serde(default)]
    pub timings: Timings,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created: DateTime<Utc>,
}

impl Verdict {
    /// A successful verdict.
    #[must_use]
    pub fn success(
        target: Target,
        run_id: impl Into<String>,
        strategy: Option<Strategy>,
        timings: Timings,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            target,
            run_id: run_id.into(),
            success: true,
            message: String::new(),
            strategy,
            timings,
            created,
        }
    }

    /// A failed verdict carrying its discriminating message.
    ///
    /// # Panics
    ///
    /// Panics if `message` is empty; an empty message is reserved for
    /// success.
    #[must_use]
    pub fn failure(
        target: Target,
        run_id: impl Into<String>,
        message: impl Into<String>,
        strategy: Option<Strategy>,
        timings: Timings,
        created: DateTime<Utc>,
    ) -> Self {
        let message = message.into();
        assert!(!message.is_empty(), "failure verdict requires a message");
        Self {
            target,
            run_id: run_id.into(),
            success: false,
            message,
            strategy,
            timings,
            created,
        }
    }
}

/// Durations as floating-point seconds on the wire.
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("duration must be non-negative"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ecosystem;

    #[test]
    fn message_empty_iff_success() {
        let target = Target::new(Ecosystem::Npm, "test-package", "1.0.0").unwrap();
        let v = Verdict::success(target.clone(), "run-1", None, Timings::default(), Utc::now());
        assert!(v.message.is_empty());

        let v = Verdict::failure(
            target,
            "run-1",
            messages::CONTENT_DIFF,
            None,
            Timings::default(),
            Utc::now(),
        );
        assert!(!v.success);
        assert_eq!(v.message, messages::CONTENT_DIFF);
    }

    #[test]
    fn timings_serialize_as_float_seconds() {
        let timings = Timings {
            source: Duration::from_millis(1500),
            infer: Duration::from_secs(2),
            build: Duration::from_millis(250),
            clone_estimate: Duration::ZERO,
        };
        let json = serde_json::to_value(timings).unwrap();
        assert!((json["source"].as_f64().unwrap() - 1.5).abs() < 1e-9);
        assert!((json["build"].as_f64().unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn created_serializes_as_millisecond_epoch() {
        let target = Target::new(Ecosystem::Npm, "test-package", "1.0.0").unwrap();
        let created: DateTime<Utc> = "2023-02-10T10:00:00Z".parse().unwrap();
        let v = Verdict::success(target, "run-1", None, Timings::default(), created);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["created"].as_i64().unwrap(), 1_676_023_200_000);
    }
}
