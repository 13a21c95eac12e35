//! Build execution.
//!
//! This module provides the orchestrator that builds a resolved artifact list.
//! It handles:
//! - DAG-based dependency ordering
//! - Parallel execution of independent instances
//! - Single-flight builds per canonical name, backed by the artifact store
//! - Failure propagation, skip tracking and run cancellation

pub mod actions;
pub mod dag;
pub mod plan;
pub mod types;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::arguments::ArgumentResolver;
use crate::artifact::{ArtifactContext, ArtifactInstance, RequiredOutput};
use crate::output::Output;
use crate::store::ArtifactStore;
use crate::util::singleflight::SingleFlight;

pub use actions::{ActionExecutor, ProcessExecutor};
pub use dag::ExecutionDag;
pub use plan::{BuildEnv, BuildPlan, BuildStep, Capture, Exec};
pub use types::{
  BuildReport, BuiltArtifact, ExecuteConfig, ExecuteError, FailedArtifact, SkipReason, bounded_parallelism,
};

type SharedResult = Result<Output, Arc<ExecuteError>>;

enum Outcome {
  Built(BuiltArtifact),
  Cached(BuiltArtifact),
  Cancelled,
}

/// Builds artifact lists against one store.
///
/// Builds are keyed by canonical name: within the orchestrator's lifetime each
/// name is built at most once, however many instances resolve to it.
pub struct Orchestrator {
  store: Arc<ArtifactStore>,
  arguments: Arc<ArgumentResolver>,
  executor: Arc<dyn ActionExecutor>,
  config: ExecuteConfig,
  cancel: CancellationToken,
  flight: SingleFlight<String, SharedResult>,
}

impl Orchestrator {
  pub fn new(
    store: Arc<ArtifactStore>,
    arguments: Arc<ArgumentResolver>,
    executor: Arc<dyn ActionExecutor>,
    config: ExecuteConfig,
  ) -> Self {
    Self {
      store,
      arguments,
      executor,
      config,
      cancel: CancellationToken::new(),
      flight: SingleFlight::new(),
    }
  }

  /// Cancelling this token stops scheduling new builds; running ones finish.
  pub fn cancellation(&self) -> &CancellationToken {
    &self.cancel
  }

  pub fn store(&self) -> &Arc<ArtifactStore> {
    &self.store
  }

  /// Build every instance in `instances`.
  ///
  /// This:
  /// 1. Constructs a DAG from the list
  /// 2. Computes parallel execution waves
  /// 3. Builds wave by wave, with bounded parallelism within each wave
  /// 4. Skips instances whose requirements failed, or everything not yet
  ///    scheduled once the run is cancelled
  ///
  /// Build failures are reported in the [`BuildReport`]; only a malformed
  /// list is an `Err`.
  pub async fn execute(self: &Arc<Self>, instances: &[ArtifactInstance]) -> Result<BuildReport, ExecuteError> {
    info!(instance_count = instances.len(), "starting build execution");

    let dag = ExecutionDag::from_instances(instances)?;
    let waves = dag.waves()?;

    info!(wave_count = waves.len(), "computed execution waves");

    let mut report = BuildReport::default();
    let mut outputs: HashMap<usize, RequiredOutput> = HashMap::new();
    let mut failed: HashSet<usize> = HashSet::new();

    let semaphore = Arc::new(Semaphore::new(bounded_parallelism(self.config.parallelism)));

    for (wave_idx, wave) in waves.iter().enumerate() {
      debug!(wave = wave_idx, instances = wave.len(), "executing wave");

      let mut ready = Vec::new();
      for &i in wave {
        let key = instances[i].key();
        let failed_dep = dag.dependencies(i).iter().find(|dep| failed.contains(dep));

        if let Some(&dep) = failed_dep {
          let reason = SkipReason::FailedDependency(instances[dep].key());
          warn!(artifact = %key, failed_dep = %instances[dep].key(), "skipping artifact due to failed dependency");
          failed.insert(i);
          report.skipped.push((key, reason));
        } else if self.cancel.is_cancelled() {
          warn!(artifact = %key, "skipping artifact: run cancelled");
          failed.insert(i);
          report.skipped.push((key, SkipReason::Cancelled));
        } else {
          let requires = dag
            .dependencies(i)
            .iter()
            .filter_map(|dep| outputs.get(dep).cloned())
            .collect();
          ready.push((i, requires));
        }
      }

      if ready.is_empty() {
        continue;
      }

      for (i, result) in self.execute_wave(instances, ready, semaphore.clone()).await {
        let instance = &instances[i];
        match result {
          Ok(Outcome::Built(built)) => {
            info!(artifact = %built.name, "build succeeded");
            outputs.insert(i, required_output(instance, &built));
            report.built.push(built);
          }
          Ok(Outcome::Cached(cached)) => {
            info!(artifact = %cached.name, "using stored output");
            outputs.insert(i, required_output(instance, &cached));
            report.cached.push(cached);
          }
          Ok(Outcome::Cancelled) => {
            warn!(artifact = %instance.key(), "skipping artifact: run cancelled");
            failed.insert(i);
            report.skipped.push((instance.key(), SkipReason::Cancelled));
          }
          Err(e) => {
            error!(artifact = %instance.key(), error = %e, "build failed");
            failed.insert(i);
            report.failed.push(FailedArtifact {
              instance: instance.key(),
              error: e,
            });
            if self.config.fail_fast {
              self.cancel.cancel();
            }
          }
        }
      }
    }

    info!(
      built = report.built.len(),
      cached = report.cached.len(),
      failed = report.failed.len(),
      skipped = report.skipped.len(),
      "build execution complete"
    );

    Ok(report)
  }

  /// Execute a wave of instances in parallel.
  async fn execute_wave(
    self: &Arc<Self>,
    instances: &[ArtifactInstance],
    ready: Vec<(usize, Vec<RequiredOutput>)>,
    semaphore: Arc<Semaphore>,
  ) -> Vec<(usize, Result<Outcome, Arc<ExecuteError>>)> {
    let mut join_set = JoinSet::new();
    let mut pending = HashSet::new();

    for (i, requires) in ready {
      let this = Arc::clone(self);
      let instance = instances[i].clone();
      let semaphore = semaphore.clone();
      pending.insert(i);

      join_set.spawn(async move {
        // Acquire semaphore permit inside the task
        let Ok(_permit) = semaphore.acquire().await else {
          return (i, Ok(Outcome::Cancelled));
        };
        if this.cancel.is_cancelled() {
          return (i, Ok(Outcome::Cancelled));
        }
        (i, this.build_instance(&instance, requires).await)
      });
    }

    let mut results = Vec::new();

    while let Some(join_result) = join_set.join_next().await {
      match join_result {
        Ok((i, result)) => {
          pending.remove(&i);
          results.push((i, result));
        }
        Err(e) => {
          error!(error = %e, "build task panicked");
        }
      }
    }

    for i in pending {
      results.push((i, Err(Arc::new(ExecuteError::TaskLost(instances[i].key().to_string())))));
    }

    results.sort_by_key(|(i, _)| *i);
    results
  }

  /// Name one instance and build it unless its name is already available.
  async fn build_instance(
    &self,
    instance: &ArtifactInstance,
    requires: Vec<RequiredOutput>,
  ) -> Result<Outcome, Arc<ExecuteError>> {
    let ctx = ArtifactContext::new(&instance.artifact, self.arguments.clone(), requires);
    let name = instance.artifact.handler().filename(&ctx).await.map_err(Arc::new)?;

    let record = |output: Output| BuiltArtifact {
      instance: instance.key(),
      name: name.clone(),
      output,
      requested: instance.requested,
    };

    if let Ok(output) = self.store.get(&name) {
      debug!(artifact = %name, "output already stored");
      return Ok(Outcome::Cached(record(output)));
    }

    let mut ran = false;
    let output = self
      .flight
      .get_or_run(name.clone(), || {
        ran = true;
        self.run_build(instance, &ctx, &name)
      })
      .await?;

    Ok(if ran {
      Outcome::Built(record(output))
    } else {
      Outcome::Cached(record(output))
    })
  }

  async fn run_build(&self, instance: &ArtifactInstance, ctx: &ArtifactContext, name: &str) -> SharedResult {
    let artifact = &instance.artifact;
    let handler = artifact.handler();
    info!(artifact = %name, requires = ctx.requires.len(), "building artifact");

    let build = async {
      let env = handler.builder(ctx).await?;
      let plan = handler.build(ctx, env).await?;
      let output = self.executor.execute(name, &plan).await?;

      if output.kind() != artifact.kind {
        return Err(ExecuteError::OutputKind {
          artifact: artifact.name.clone(),
          expected: artifact.kind,
          found: output.kind(),
        });
      }

      self.store.store(name, output.clone())?;
      Ok(output)
    };

    build.await.map_err(Arc::new)
  }
}

fn required_output(instance: &ArtifactInstance, built: &BuiltArtifact) -> RequiredOutput {
  RequiredOutput {
    artifact: instance.name().to_string(),
    name: built.name.clone(),
    output: built.output.clone(),
  }
}
