//! The per-target state machine
//!
//! States run linearly: inferring → fetching_upstream → building →
//! stabilizing → comparing → done. Fatal failures short-circuit to done
//! with the failure classified; a target is retried at most once, and
//! only on `Transient` failures.

use crate::builder::Builder;
use chrono::Utc;
use rebuildr_compare::{classify, diff_summaries, render_diff, summarize};
use rebuildr_config::Config;
use rebuildr_errors::{Error, Result};
use rebuildr_events::{
    AppEvent, AssetEvent, CompareEvent, EventEmitter, EventSender, PipelineEvent,
};
use rebuildr_hash::Hash;
use rebuildr_infer::{rebuilder_for, RegistryEvidence};
use rebuildr_net::{NetClient, NetConfig, RegistryLimiter};
use rebuildr_registry::{client_for, guess_artifact, RegistryClient, RegistryContext};
use rebuildr_repo::RepoCache;
use rebuildr_rundex::{Rebuild, Run, RundexWriter};
use rebuildr_stabilize::stabilize;
use rebuildr_store::AssetStore;
use rebuildr_types::{
    Asset, AssetKind, BuildEnv, Location, Strategy, Target, Timings, Verdict,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Pipeline states. Transitions are linear; the tag prefixes failure
/// messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Inferring,
    FetchingUpstream,
    Building,
    Stabilizing,
    Comparing,
    Done,
}

impl Stage {
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Stage::Inferring => "inference",
            Stage::FetchingUpstream => "fetching_upstream",
            Stage::Building => "build",
            Stage::Stabilizing => "stabilize",
            Stage::Comparing => "compare",
            Stage::Done => "done",
        }
    }
}

/// An error tagged with the stage it happened in.
struct StagedError {
    stage: Stage,
    error: Error,
}

fn staged(stage: Stage) -> impl Fn(Error) -> StagedError {
    move |error| StagedError { stage, error }
}

/// JSON build metadata persisted per attempt.
#[derive(Debug, Serialize)]
struct BuildInfo<'a> {
    target: &'a Target,
    run_id: &'a str,
    strategy_kind: &'a str,
    strategy: &'a Strategy,
    executor_version: String,
    timings: Timings,
    upstream_hash: Hash,
    rebuild_hash: Hash,
    upstream_integrity: Option<&'a str>,
}

/// Constructor for ecosystem registry clients; swappable so tests can
/// point the pipeline at fake registries.
type RegistryFactory =
    dyn Fn(rebuildr_types::Ecosystem, RegistryContext) -> Box<dyn RegistryClient> + Send + Sync;

/// One pipeline instance, shared by all workers of a run.
pub struct RebuildPipeline {
    config: Config,
    net: NetClient,
    limiter: Arc<RegistryLimiter>,
    repo_cache: RepoCache,
    builder: Arc<dyn Builder>,
    assets: Arc<dyn AssetStore>,
    rundex: Arc<dyn RundexWriter>,
    registry_factory: Arc<RegistryFactory>,
    events: Option<EventSender>,
    cancel: CancellationToken,
}

impl EventEmitter for RebuildPipeline {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl RebuildPipeline {
    /// Assemble a pipeline from its collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        config: Config,
        builder: Arc<dyn Builder>,
        assets: Arc<dyn AssetStore>,
        rundex: Arc<dyn RundexWriter>,
    ) -> Result<Self> {
        let net = NetClient::new(NetConfig {
            timeout: Duration::from_secs(config.network.timeout_secs),
            connect_timeout: Duration::from_secs(config.network.connect_timeout_secs),
            retry_count: config.network.retry_count,
            ..NetConfig::default()
        })?;
        let repo_cache = RepoCache::new(&config.paths.git_cache);
        Ok(Self {
            config,
            net,
            limiter: Arc::new(RegistryLimiter::with_defaults()),
            repo_cache,
            builder,
            assets,
            rundex,
            registry_factory: Arc::new(client_for),
            events: None,
            cancel: CancellationToken::new(),
        })
    }

    #[must_use]
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Swap the registry constructor; tests point this at fakes.
    #[must_use]
    pub fn with_registry_factory(
        mut self,
        factory: impl Fn(rebuildr_types::Ecosystem, RegistryContext) -> Box<dyn RegistryClient>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.registry_factory = Arc::new(factory);
        self
    }

    /// Token that cancels every in-flight target when triggered.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one target to completion and persist its verdict.
    pub async fn run_target(&self, target: Target, run: &Run) -> Verdict {
        self.run_target_with_hint(target, run, None).await
    }

    /// Run one target, optionally steered by an externally-proposed
    /// strategy (the recovery loop's output, or a location hint).
    pub async fn run_target_with_hint(
        &self,
        mut target: Target,
        run: &Run,
        hint: Option<Strategy>,
    ) -> Verdict {
        self.emit(AppEvent::Pipeline(PipelineEvent::TargetStarted {
            target: target.clone(),
        }));

        if target.artifact.is_none() {
            let guessed = guess_artifact(&target);
            // A fresh target cannot refuse its first artifact name.
            let _ = target.set_artifact(guessed);
        }

        let mut verdict = None;
        for attempt in 0..=1u8 {
            match self.attempt(&target, run, hint.as_ref()).await {
                Ok(v) => {
                    verdict = Some(v);
                    break;
                }
                Err(e) if e.error.is_transient() && attempt == 0 => {
                    let reason = format!("{}: {}", e.stage.tag(), e.error);
                    warn!(target = %target, %reason, "retrying after transient failure");
                    self.emit(AppEvent::Pipeline(PipelineEvent::TargetRetried {
                        target: target.clone(),
                        reason,
                    }));
                }
                Err(e) => {
                    verdict = Some(Verdict::failure(
                        target.clone(),
                        run.id.clone(),
                        format!("{}: {}", e.stage.tag(), e.error),
                        None,
                        Timings::default(),
                        Utc::now(),
                    ));
                    break;
                }
            }
        }
        // The loop always assigns before exiting; the second iteration
        // cannot take the retry arm.
        let verdict = verdict.unwrap_or_else(|| {
            Verdict::failure(
                target.clone(),
                run.id.clone(),
                "internal: retry loop exhausted without verdict".to_string(),
                None,
                Timings::default(),
                Utc::now(),
            )
        });

        let rebuild = Rebuild::from_verdict(&verdict, self.builder.version());
        if let Err(e) = self.rundex.write_rebuild(&rebuild).await {
            warn!(target = %verdict.target, error = %e, "failed to persist rebuild record");
        }
        self.emit(AppEvent::Pipeline(PipelineEvent::TargetCompleted {
            verdict: Box::new(verdict.clone()),
        }));
        verdict
    }

    fn ensure_live(&self, stage: Stage) -> std::result::Result<(), StagedError> {
        if self.cancel.is_cancelled() {
            return Err(StagedError {
                stage,
                error: Error::Cancelled,
            });
        }
        Ok(())
    }

    fn stage_started(&self, target: &Target, stage: Stage) -> Instant {
        self.emit(AppEvent::Pipeline(PipelineEvent::StageStarted {
            target: target.clone(),
            stage: stage.tag().to_string(),
        }));
        Instant::now()
    }

    fn stage_completed(&self, target: &Target, stage: Stage, started: Instant) -> Duration {
        let duration = started.elapsed();
        self.emit(AppEvent::Pipeline(PipelineEvent::StageCompleted {
            target: target.clone(),
            stage: stage.tag().to_string(),
            duration,
        }));
        duration
    }

    async fn store_asset(
        &self,
        run_id: &str,
        target: &Target,
        kind: AssetKind,
        data: &[u8],
        stage: Stage,
    ) -> std::result::Result<(), StagedError> {
        self.assets
            .put(run_id, &Asset::new(target.clone(), kind), data)
            .await
            .map_err(staged(stage))?;
        self.emit(AppEvent::Asset(AssetEvent::Stored {
            target: target.clone(),
            kind,
            bytes: data.len() as u64,
        }));
        Ok(())
    }

    /// One pass through the state machine.
    #[allow(clippy::too_many_lines)]
    async fn attempt(
        &self,
        target: &Target,
        run: &Run,
        hint: Option<&Strategy>,
    ) -> std::result::Result<Verdict, StagedError> {
        let mut timings = Timings::default();

        // --- inferring ---------------------------------------------------
        self.ensure_live(Stage::Inferring)?;
        let started = self.stage_started(target, Stage::Inferring);
        let registry = (self.registry_factory)(
            target.ecosystem,
            RegistryContext::new(self.net.clone(), self.limiter.clone()),
        );
        let evidence = RegistryEvidence {
            package: registry
                .package(&target.package)
                .await
                .map_err(staged(Stage::Inferring))?,
            version: registry
                .version(&target.package, &target.version)
                .await
                .map_err(staged(Stage::Inferring))?,
        };

        let (strategy, clone_estimate) = match hint {
            // A full strategy from the recovery loop skips inference.
            Some(s) if !s.is_hint() => (s.clone(), Duration::ZERO),
            _ => {
                let hint_location = match hint {
                    Some(Strategy::LocationHint { location }) => Some(location.clone()),
                    _ => None,
                };
                self.infer_blocking(target, &evidence, hint_location)
                    .await
                    .map_err(staged(Stage::Inferring))?
            }
        };
        timings.clone_estimate = clone_estimate;
        timings.infer = self.stage_completed(target, Stage::Inferring, started);
        debug!(target = %target, strategy = strategy.kind(), "strategy inferred");

        let env = BuildEnv {
            timewarp_host: self.config.network.timewarp_host.clone(),
            has_repo: false,
        };
        let instructions = strategy
            .generate_for(target, &env)
            .map_err(staged(Stage::Building))?;

        // --- fetching_upstream -------------------------------------------
        self.ensure_live(Stage::FetchingUpstream)?;
        let started = self.stage_started(target, Stage::FetchingUpstream);
        let upstream = registry
            .artifact(&target.package, &target.version)
            .await
            .map_err(staged(Stage::FetchingUpstream))?;
        self.store_asset(
            &run.id,
            target,
            AssetKind::UpstreamArtifact,
            &upstream,
            Stage::FetchingUpstream,
        )
        .await?;
        self.stage_completed(target, Stage::FetchingUpstream, started);

        // --- building ----------------------------------------------------
        self.ensure_live(Stage::Building)?;
        let started = self.stage_started(target, Stage::Building);
        let build_timeout = Duration::from_secs(self.config.pipeline.build_timeout_secs);
        let output = self
            .builder
            .build(target, &instructions, build_timeout)
            .await
            .map_err(staged(Stage::Building))?;
        timings.source = output.source_duration;
        timings.build = output.build_duration;
        self.store_asset(
            &run.id,
            target,
            AssetKind::BuildLogs,
            &output.logs,
            Stage::Building,
        )
        .await?;
        self.store_asset(
            &run.id,
            target,
            AssetKind::RebuildArtifact,
            &output.artifact,
            Stage::Building,
        )
        .await?;
        if let Ok(yaml) = strategy.to_yaml() {
            self.store_asset(
                &run.id,
                target,
                AssetKind::BuildDefinition,
                yaml.as_bytes(),
                Stage::Building,
            )
            .await?;
        }
        self.stage_completed(target, Stage::Building, started);

        // --- stabilizing -------------------------------------------------
        self.ensure_live(Stage::Stabilizing)?;
        let started = self.stage_started(target, Stage::Stabilizing);
        let artifact_name = target.artifact_name().to_string();
        let stable_upstream = stabilize(&artifact_name, &upstream, target.ecosystem)
            .map_err(staged(Stage::Stabilizing))?;
        let stable_rebuild = stabilize(&artifact_name, &output.artifact, target.ecosystem)
            .map_err(staged(Stage::Stabilizing))?;
        self.store_asset(
            &run.id,
            target,
            AssetKind::DebugUpstream,
            &stable_upstream,
            Stage::Stabilizing,
        )
        .await?;
        self.store_asset(
            &run.id,
            target,
            AssetKind::DebugRebuild,
            &stable_rebuild,
            Stage::Stabilizing,
        )
        .await?;
        self.stage_completed(target, Stage::Stabilizing, started);

        // --- comparing ---------------------------------------------------
        self.ensure_live(Stage::Comparing)?;
        let started = self.stage_started(target, Stage::Comparing);
        let upstream_summary = summarize(&stable_upstream).map_err(staged(Stage::Comparing))?;
        let rebuild_summary = summarize(&stable_rebuild).map_err(staged(Stage::Comparing))?;
        self.emit(AppEvent::Compare(CompareEvent::Summarized {
            target: target.clone(),
            upstream_files: upstream_summary.files.len(),
            rebuild_files: rebuild_summary.files.len(),
        }));
        let diff = diff_summaries(&upstream_summary, &rebuild_summary);
        if !diff.is_empty() {
            self.store_asset(
                &run.id,
                target,
                AssetKind::Diff,
                render_diff(&diff).as_bytes(),
                Stage::Comparing,
            )
            .await?;
        }
        let classification = classify(&upstream_summary, &rebuild_summary, &diff);
        self.stage_completed(target, Stage::Comparing, started);

        // --- done --------------------------------------------------------
        let info = BuildInfo {
            target,
            run_id: &run.id,
            strategy_kind: strategy.kind(),
            strategy: &strategy,
            executor_version: self.builder.version(),
            timings,
            upstream_hash: Hash::from_data(&upstream),
            rebuild_hash: Hash::from_data(&output.artifact),
            upstream_integrity: evidence.version.integrity.as_deref(),
        };
        let info_json = serde_json::to_vec_pretty(&info)
            .map_err(|e| staged(Stage::Done)(Error::internal(format!("build info: {e}"))))?;
        self.store_asset(&run.id, target, AssetKind::BuildInfo, &info_json, Stage::Done)
            .await?;

        let verdict = match classification {
            None => Verdict::success(
                target.clone(),
                run.id.clone(),
                Some(strategy),
                timings,
                Utc::now(),
            ),
            Some(message) => {
                self.emit(AppEvent::Compare(CompareEvent::Classified {
                    target: target.clone(),
                    message: message.to_string(),
                }));
                Verdict::failure(
                    target.clone(),
                    run.id.clone(),
                    message,
                    Some(strategy),
                    timings,
                    Utc::now(),
                )
            }
        };
        Ok(verdict)
    }

    /// Clone (or reuse) the repository and run inference, off the async
    /// runtime: libgit2 is blocking.
    async fn infer_blocking(
        &self,
        target: &Target,
        evidence: &RegistryEvidence,
        hint_location: Option<Location>,
    ) -> Result<(Strategy, Duration)> {
        let cache = self.repo_cache.clone();
        let target = target.clone();
        let evidence = evidence.clone();
        let repo_url = hint_location
            .as_ref()
            .filter(|l| !l.repo.is_empty())
            .map(|l| l.repo.clone())
            .or_else(|| evidence.repo_url());

        tokio::task::spawn_blocking(move || {
            let clone_started = Instant::now();
            let repo = match &repo_url {
                Some(url) => Some(cache.open_or_clone(url)?),
                None => None,
            };
            let clone_estimate = clone_started.elapsed();
            let rebuilder = rebuilder_for(target.ecosystem);
            let strategy =
                rebuilder.infer(&target, &evidence, repo.as_ref(), hint_location.as_ref())?;
            Ok((strategy, clone_estimate))
        })
        .await
        .map_err(|e| Error::internal(format!("inference task: {e}")))?
    }
}
