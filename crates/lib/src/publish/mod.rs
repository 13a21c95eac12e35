//! Publishing built artifacts.
//!
//! The [`Publisher`] fans out one task per [`PublishJob`], bounded by a
//! weighted semaphore. Every task runs to completion; failures are collected
//! in the [`PublishReport`] rather than stopping the others.

pub mod backend;
mod types;

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::artifact::ArtifactInstance;
use crate::execute::{BuildReport, bounded_parallelism};

pub use backend::{HttpBackend, LocalBackend, PublishBackend, backend_for};
pub use types::{PublishConfig, PublishError, PublishFailure, PublishJob, PublishReport, PublishedArtifact};

/// Runs publish jobs with bounded parallelism.
pub struct Publisher {
  config: PublishConfig,
  backend: Option<Arc<dyn PublishBackend>>,
}

impl Publisher {
  /// A publisher that picks a backend per job from its destination.
  pub fn new(config: PublishConfig) -> Self {
    Self { config, backend: None }
  }

  /// Send every job through `backend`, whatever its destination.
  pub fn with_backend(mut self, backend: Arc<dyn PublishBackend>) -> Self {
    self.backend = Some(backend);
    self
  }

  /// Publish all jobs and wait for every one of them.
  pub async fn publish(&self, jobs: Vec<PublishJob>) -> PublishReport {
    let capacity = bounded_parallelism(self.config.parallelism);
    let semaphore = Arc::new(Semaphore::new(capacity));
    let max_weight = u32::try_from(capacity).unwrap_or(u32::MAX);
    info!(jobs = jobs.len(), parallelism = capacity, "starting publish");

    let mut join_set = JoinSet::new();
    for (i, job) in jobs.iter().cloned().enumerate() {
      let semaphore = semaphore.clone();
      let backend = self.backend.clone();
      let weight = job.weight.clamp(1, max_weight);

      join_set.spawn(async move {
        let result = match semaphore.acquire_many(weight).await {
          Ok(_permit) => {
            debug!(artifact = %job.name, destination = %job.destination, weight, "publishing");
            match backend {
              Some(backend) => backend.publish(&job).await,
              None => match backend_for(&job.destination) {
                Ok(backend) => backend.publish(&job).await,
                Err(e) => Err(e),
              },
            }
          }
          Err(_) => Err(PublishError::TaskLost(job.name.clone())),
        };
        (i, result)
      });
    }

    let mut results: Vec<_> = jobs.iter().map(|_| None).collect();

    while let Some(join_result) = join_set.join_next().await {
      match join_result {
        Ok((i, result)) => {
          results[i] = Some(result);
        }
        Err(e) => {
          error!(error = %e, "publish task panicked");
        }
      }
    }

    let report = PublishReport {
      results: jobs
        .iter()
        .zip(results)
        .map(|(job, result)| {
          let result = result.unwrap_or_else(|| Err(PublishError::TaskLost(job.name.clone())));
          result.map_err(|e| {
            error!(artifact = %job.name, destination = %job.destination, error = %e, "publish failed");
            PublishFailure {
              name: job.name.clone(),
              destination: job.destination.clone(),
              error: Arc::new(e),
            }
          })
        })
        .collect(),
    };

    info!(
      published = report.published().count(),
      failed = report.failures().count(),
      "publish complete"
    );
    report
  }
}

/// Publish jobs for the requested, publishable artifacts of a build.
///
/// Instances that only fed other builds are not published, nor are artifacts
/// whose handler opts out.
pub fn publish_jobs(instances: &[ArtifactInstance], report: &BuildReport, destination: &str) -> Vec<PublishJob> {
  let mut seen = HashSet::new();
  report
    .requested()
    .filter_map(|built| {
      let instance = instances.iter().find(|i| i.key() == built.instance)?;
      let handler = instance.artifact.handler();
      if !handler.publisher() || !seen.insert(built.name.clone()) {
        return None;
      }
      Some(handler.publish(&built.name, &built.output, destination))
    })
    .collect()
}
