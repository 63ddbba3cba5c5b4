//! Local filesystem rundex backend
//!
//! Layout:
//! - `rundex/runs/<run_id>.json`
//! - `rundex/runs_metadata/<ecosystem>/<package>/<version>/<artifact>/firestore.json`
//!
//! Each `firestore.json` holds every attempt for one target, across
//! runs, as a JSON array.

use crate::{FetchRebuildOpts, Rebuild, Run, RundexReader, RundexWriter};
use async_trait::async_trait;
use rebuildr_errors::{Error, Result, StorageError};
use rebuildr_types::Target;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

pub struct LocalRundex {
    root: PathBuf,
    // Concurrent writers to the same target file are serialized here;
    // last writer wins.
    write_lock: Mutex<()>,
}

impl LocalRundex {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn runs_dir(&self) -> PathBuf {
        self.root.join("rundex").join("runs")
    }

    fn metadata_path(&self, target: &Target) -> PathBuf {
        self.root
            .join("rundex")
            .join("runs_metadata")
            .join(target.ecosystem.to_string())
            .join(&target.package)
            .join(&target.version)
            .join(target.artifact_name())
            .join("firestore.json")
    }

    async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        match fs::read(path).await {
            Ok(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(|e| {
                    Error::Storage(StorageError::CorruptedData {
                        message: format!("{}: {e}", path.display()),
                    })
                })?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io_with_path(&e, path)),
        }
    }

    async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }
        let bytes = serde_json::to_vec_pretty(value)?;
        fs::write(path, bytes)
            .await
            .map_err(|e| Error::io_with_path(&e, path))
    }

    /// Every firestore.json under runs_metadata.
    async fn metadata_files(&self) -> Result<Vec<PathBuf>> {
        let base = self.root.join("rundex").join("runs_metadata");
        let mut stack = vec![base];
        let mut out = Vec::new();
        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::io_with_path(&e, &dir)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Error::io_with_path(&e, &dir))?
            {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.file_name().is_some_and(|n| n == "firestore.json") {
                    out.push(path);
                }
            }
        }
        out.sort();
        Ok(out)
    }
}

#[async_trait]
impl RundexWriter for LocalRundex {
    async fn write_run(&self, run: &Run) -> Result<()> {
        let path = self.runs_dir().join(format!("{}.json", run.id));
        // Runs are immutable once written.
        if fs::try_exists(&path)
            .await
            .map_err(|e| Error::io_with_path(&e, &path))?
        {
            return Ok(());
        }
        Self::write_json(&path, run).await
    }

    async fn write_rebuild(&self, rebuild: &Rebuild) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.metadata_path(&rebuild.attempt.target);
        let mut records: Vec<Rebuild> = Self::read_json(&path).await?.unwrap_or_default();
        // Idempotent on (run_id, target): replace rather than append.
        records.retain(|r| r.attempt.run_id != rebuild.attempt.run_id);
        records.push(rebuild.clone());
        records.sort_by_key(|r| r.created);
        Self::write_json(&path, &records).await
    }
}

#[async_trait]
impl RundexReader for LocalRundex {
    async fn runs(&self) -> Result<Vec<Run>> {
        let dir = self.runs_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io_with_path(&e, &dir)),
        };
        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io_with_path(&e, &dir))?
        {
            if let Some(run) = Self::read_json::<Run>(&entry.path()).await? {
                out.push(run);
            }
        }
        out.sort_by_key(|r| r.created);
        Ok(out)
    }

    async fn rebuilds(&self, opts: &FetchRebuildOpts) -> Result<Vec<Rebuild>> {
        let pattern = opts
            .message_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| Error::internal(format!("message pattern: {e}")))?;

        let mut out = Vec::new();
        for path in self.metadata_files().await? {
            let Some(records) = Self::read_json::<Vec<Rebuild>>(&path).await? else {
                continue;
            };
            for rebuild in records {
                if !opts.run_ids.is_empty() && !opts.run_ids.contains(&rebuild.attempt.run_id) {
                    continue;
                }
                if let Some(prefix) = &opts.message_prefix {
                    if !rebuild.attempt.message.starts_with(prefix.as_str()) {
                        continue;
                    }
                }
                if let Some(re) = &pattern {
                    if !re.is_match(&rebuild.attempt.message) {
                        continue;
                    }
                }
                out.push(rebuild);
            }
        }

        if opts.latest_per_package {
            let mut latest: HashMap<String, Rebuild> = HashMap::new();
            for rebuild in out {
                let key = rebuild.attempt.target.encoded();
                match latest.get(&key) {
                    Some(existing) if existing.created >= rebuild.created => {}
                    _ => {
                        latest.insert(key, rebuild);
                    }
                }
            }
            let mut deduped: Vec<Rebuild> = latest.into_values().collect();
            deduped.sort_by(|a, b| a.attempt.target.encoded().cmp(&b.attempt.target.encoded()));
            return Ok(deduped);
        }

        out.sort_by_key(|r| r.created);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rebuildr_types::{Ecosystem, RunType, Timings, Verdict};

    fn verdict(run_id: &str, version: &str, at: chrono::DateTime<Utc>) -> Verdict {
        let mut target = Target::new(Ecosystem::Npm, "left-pad", version).unwrap();
        target
            .set_artifact(format!("left-pad-{version}.tgz"))
            .unwrap();
        Verdict::success(target, run_id, None, Timings::default(), at)
    }

    #[tokio::test]
    async fn runs_are_immutable() {
        let dir = tempfile::tempdir().unwrap();
        let rundex = LocalRundex::new(dir.path());
        let mut run = Run {
            id: "run-1".to_string(),
            benchmark_name: "bench.json".to_string(),
            benchmark_hash: "h1".to_string(),
            run_type: RunType::Smoketest,
            created: Utc::now(),
        };
        rundex.write_run(&run).await.unwrap();
        run.benchmark_hash = "h2".to_string();
        rundex.write_run(&run).await.unwrap();

        let runs = rundex.runs().await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].benchmark_hash, "h1");
    }

    #[tokio::test]
    async fn rebuild_writes_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let rundex = LocalRundex::new(dir.path());
        let at = Utc::now();

        let first = Rebuild::from_verdict(&verdict("run-1", "1.3.0", at), "rebuildr/0.1.0");
        rundex.write_rebuild(&first).await.unwrap();
        rundex.write_rebuild(&first).await.unwrap();

        let all = rundex.rebuilds(&FetchRebuildOpts::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn latest_per_package_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let rundex = LocalRundex::new(dir.path());
        let at = Utc::now();

        let old = Rebuild::from_verdict(&verdict("run-1", "1.3.0", at), "rebuildr/0.1.0");
        let new = Rebuild::from_verdict(
            &verdict("run-2", "1.3.0", at + Duration::seconds(5)),
            "rebuildr/0.1.0",
        );
        rundex.write_rebuild(&old).await.unwrap();
        rundex.write_rebuild(&new).await.unwrap();

        let latest = rundex
            .rebuilds(&FetchRebuildOpts {
                latest_per_package: true,
                ..FetchRebuildOpts::default()
            })
            .await
            .unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].attempt.run_id, "run-2");
    }

    #[tokio::test]
    async fn message_prefix_filter() {
        let dir = tempfile::tempdir().unwrap();
        let rundex = LocalRundex::new(dir.path());
        let at = Utc::now();

        let ok = Rebuild::from_verdict(&verdict("run-1", "1.3.0", at), "rebuildr/0.1.0");
        let mut target = Target::new(Ecosystem::Npm, "left-pad", "1.2.0").unwrap();
        target.set_artifact("left-pad-1.2.0.tgz").unwrap();
        let failed = Rebuild::from_verdict(
            &Verdict::failure(
                target,
                "run-1",
                "inference: no valid ref found for left-pad@1.2.0",
                None,
                Timings::default(),
                at,
            ),
            "rebuildr/0.1.0",
        );
        rundex.write_rebuild(&ok).await.unwrap();
        rundex.write_rebuild(&failed).await.unwrap();

        let inference_failures = rundex
            .rebuilds(&FetchRebuildOpts {
                message_prefix: Some("inference:".to_string()),
                ..FetchRebuildOpts::default()
            })
            .await
            .unwrap();
        assert_eq!(inference_failures.len(), 1);
        assert_eq!(inference_failures[0].attempt.target.version, "1.2.0");
    }
}
