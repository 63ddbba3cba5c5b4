//! Build execution
//!
//! The pipeline hands rendered instructions to a [`Builder`] and gets
//! back the artifact bytes plus logs. The local builder shells the
//! three script bodies out in a scratch directory; sandboxed execution
//! is an external builder's concern.

use async_trait::async_trait;
use rebuildr_errors::{BuildError, Error, Result};
use rebuildr_types::{Instructions, Target};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// What a build produced.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub artifact: Vec<u8>,
    pub logs: Vec<u8>,
    /// Wall clock of the source script.
    pub source_duration: Duration,
    /// Wall clock of the deps and build scripts.
    pub build_duration: Duration,
}

/// Executes rendered instructions in an isolated build root.
#[async_trait]
pub trait Builder: Send + Sync {
    async fn build(
        &self,
        target: &Target,
        instructions: &Instructions,
        timeout: Duration,
    ) -> Result<BuildOutput>;

    /// Identification recorded in build-info assets.
    fn version(&self) -> String;
}

/// Runs the scripts directly on the host under a temp directory.
#[derive(Debug, Clone)]
pub struct LocalBuilder {
    workdir_root: PathBuf,
}

impl LocalBuilder {
    #[must_use]
    pub fn new(workdir_root: impl Into<PathBuf>) -> Self {
        Self {
            workdir_root: workdir_root.into(),
        }
    }

    async fn run_step(
        step: &str,
        script: &str,
        cwd: &Path,
        timeout: Duration,
        logs: &mut Vec<u8>,
    ) -> Result<()> {
        if script.is_empty() {
            return Ok(());
        }
        logs.extend_from_slice(format!("=== {step} ===\n").as_bytes());

        let child = Command::new("sh")
            .arg("-e")
            .arg("-c")
            .arg(script)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::from(BuildError::Unavailable {
                    message: format!("spawning {step}: {e}"),
                })
            })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::from(BuildError::Timeout {
                    seconds: timeout.as_secs(),
                })
            })?
            .map_err(|e| {
                Error::from(BuildError::Unavailable {
                    message: format!("waiting for {step}: {e}"),
                })
            })?;

        logs.extend_from_slice(&output.stdout);
        logs.extend_from_slice(&output.stderr);

        if !output.status.success() {
            return match output.status.code() {
                Some(code) => Err(BuildError::StepFailed {
                    step: step.to_string(),
                    code,
                }
                .into()),
                None => Err(BuildError::StepKilled {
                    step: step.to_string(),
                }
                .into()),
            };
        }
        Ok(())
    }
}

#[async_trait]
impl Builder for LocalBuilder {
    async fn build(
        &self,
        target: &Target,
        instructions: &Instructions,
        timeout: Duration,
    ) -> Result<BuildOutput> {
        tokio::fs::create_dir_all(&self.workdir_root)
            .await
            .map_err(|e| Error::io_with_path(&e, &self.workdir_root))?;
        // The scratch root is released on every exit path.
        let workdir = tempfile::Builder::new()
            .prefix(&format!("build-{}-", target.package.replace('/', "-")))
            .tempdir_in(&self.workdir_root)
            .map_err(|e| Error::io_with_path(&e, &self.workdir_root))?;
        let root = workdir.path();
        let mut logs = Vec::new();

        let source_started = Instant::now();
        Self::run_step("source", &instructions.source, root, timeout, &mut logs).await?;
        let source_duration = source_started.elapsed();

        let build_started = Instant::now();
        Self::run_step("deps", &instructions.deps, root, timeout, &mut logs).await?;
        Self::run_step("build", &instructions.build, root, timeout, &mut logs).await?;
        let build_duration = build_started.elapsed();

        let artifact_path = root.join(&instructions.output_path);
        let artifact = tokio::fs::read(&artifact_path).await.map_err(|_| {
            Error::from(BuildError::MissingArtifact {
                path: instructions.output_path.display().to_string(),
            })
        })?;

        Ok(BuildOutput {
            artifact,
            logs,
            source_duration,
            build_duration,
        })
    }

    fn version(&self) -> String {
        format!("rebuildr-local/{}", env!("CARGO_PKG_VERSION"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebuildr_types::{Ecosystem, Location};

    fn instructions(source: &str, build: &str, output: &str) -> Instructions {
        Instructions {
            location: Location::default(),
            system_deps: vec![],
            source: source.to_string(),
            deps: String::new(),
            build: build.to_string(),
            output_path: PathBuf::from(output),
        }
    }

    fn target() -> Target {
        let mut t = Target::new(Ecosystem::Npm, "test-package", "1.0.0").unwrap();
        t.set_artifact("test-package-1.0.0.tgz").unwrap();
        t
    }

    #[tokio::test]
    async fn runs_scripts_and_collects_artifact() {
        let root = tempfile::tempdir().unwrap();
        let builder = LocalBuilder::new(root.path());
        let output = builder
            .build(
                &target(),
                &instructions(
                    "echo source-step",
                    "printf artifact > test-package-1.0.0.tgz",
                    "test-package-1.0.0.tgz",
                ),
                Duration::from_secs(30),
            )
            .await
            .unwrap();
        assert_eq!(output.artifact, b"artifact");
        assert!(String::from_utf8_lossy(&output.logs).contains("source-step"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_build_failure() {
        let root = tempfile::tempdir().unwrap();
        let builder = LocalBuilder::new(root.path());
        let err = builder
            .build(
                &target(),
                &instructions("exit 3", "true", "missing.tgz"),
                Duration::from_secs(30),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), rebuildr_errors::ErrorKind::BuildFailure);
    }

    #[tokio::test]
    async fn missing_artifact_is_build_failure() {
        let root = tempfile::tempdir().unwrap();
        let builder = LocalBuilder::new(root.path());
        let err = builder
            .build(
                &target(),
                &instructions("true", "true", "never-created.tgz"),
                Duration::from_secs(30),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), rebuildr_errors::ErrorKind::BuildFailure);
    }
}
