//! Implementation of the `relgraph build` command.
//!
//! Resolves descriptors against the standard catalog, builds the resulting
//! artifact list and, given a destination, publishes the requested outputs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::warn;

use relgraph_lib::arguments::ArgumentResolver;
use relgraph_lib::catalog::standard_registry;
use relgraph_lib::config::RunOptions;
use relgraph_lib::execute::{BuildReport, ExecuteConfig, Orchestrator, ProcessExecutor};
use relgraph_lib::publish::{PublishConfig, PublishReport, Publisher, PublishedArtifact, publish_jobs};
use relgraph_lib::store::ArtifactStore;

use crate::output::{
  OutputFormat, format_duration, print_error, print_info, print_json, print_stat, print_success, print_warning, symbols,
};

/// Build settings taken from the command line.
#[derive(Debug, Default)]
pub struct BuildOptions {
  pub parallelism: Option<usize>,
  pub work_dir: Option<PathBuf>,
  pub destination: Option<String>,
  pub fail_fast: bool,
  pub timeout: Option<Duration>,
}

impl BuildOptions {
  fn execute_config(&self) -> ExecuteConfig {
    let mut config = ExecuteConfig::default();
    if let Some(parallelism) = self.parallelism {
      config.parallelism = parallelism.max(1);
    }
    if let Some(work_dir) = &self.work_dir {
      config.work_dir = work_dir.clone();
    }
    config.fail_fast = self.fail_fast;
    config
  }
}

#[derive(Serialize)]
struct BuildSummary<'a> {
  built: Vec<&'a str>,
  cached: Vec<&'a str>,
  failed: Vec<FailureSummary>,
  skipped: Vec<FailureSummary>,
  published: Vec<&'a PublishedArtifact>,
  publish_failed: Vec<FailureSummary>,
  duration_ms: u128,
}

#[derive(Serialize)]
struct FailureSummary {
  artifact: String,
  reason: String,
}

pub fn cmd_build(descriptors: &[String], run: RunOptions, options: BuildOptions, output: OutputFormat) -> Result<()> {
  let start = Instant::now();

  let registry = standard_registry().context("Failed to load artifact catalog")?;
  let instances = registry
    .final_artifact_list(descriptors, &run)
    .context("Failed to resolve artifacts")?;

  if instances.is_empty() {
    print_warning("No artifacts match the selected targets");
    return Ok(());
  }

  let config = options.execute_config();
  let publish_config = PublishConfig {
    parallelism: config.parallelism,
  };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let (report, published) = rt.block_on(async {
    let store = Arc::new(ArtifactStore::new());
    let executor = Arc::new(ProcessExecutor::from_config(&config));
    let orchestrator = Arc::new(Orchestrator::new(store, ArgumentResolver::new(&run), executor, config));

    let cancel = orchestrator.cancellation().clone();
    let timeout = options.timeout;
    tokio::spawn(async move {
      let expired = async {
        match timeout {
          Some(timeout) => tokio::time::sleep(timeout).await,
          None => std::future::pending().await,
        }
      };
      tokio::select! {
        _ = tokio::signal::ctrl_c() => warn!("interrupted, letting running builds finish"),
        _ = expired => warn!("build timed out, letting running builds finish"),
      }
      cancel.cancel();
    });

    let report = orchestrator.execute(&instances).await.context("Build failed")?;

    let published = match &options.destination {
      Some(destination) => {
        let jobs = publish_jobs(&instances, &report, destination);
        Some(Publisher::new(publish_config).publish(jobs).await)
      }
      None => None,
    };

    anyhow::Ok((report, published))
  })?;

  let elapsed = start.elapsed();
  if output.is_json() {
    print_json(&summary(&report, published.as_ref(), elapsed))?;
  } else {
    print_text(&report, published.as_ref(), elapsed);
  }

  if !report.is_success() {
    bail!(
      "{} artifact(s) failed, {} skipped",
      report.failed.len(),
      report.skipped.len()
    );
  }
  if let Some(failure) = published.as_ref().and_then(PublishReport::first_error) {
    bail!("Failed to publish {}: {}", failure.name, failure.error);
  }
  Ok(())
}

fn summary<'a>(report: &'a BuildReport, published: Option<&'a PublishReport>, elapsed: Duration) -> BuildSummary<'a> {
  BuildSummary {
    built: report.built.iter().map(|b| b.name.as_str()).collect(),
    cached: report.cached.iter().map(|b| b.name.as_str()).collect(),
    failed: report
      .failed
      .iter()
      .map(|f| FailureSummary {
        artifact: f.instance.to_string(),
        reason: f.error.to_string(),
      })
      .collect(),
    skipped: report
      .skipped
      .iter()
      .map(|(key, reason)| FailureSummary {
        artifact: key.to_string(),
        reason: reason.to_string(),
      })
      .collect(),
    published: published.map(|p| p.published().collect()).unwrap_or_default(),
    publish_failed: published
      .map(|p| {
        p.failures()
          .map(|f| FailureSummary {
            artifact: f.name.clone(),
            reason: f.error.to_string(),
          })
          .collect()
      })
      .unwrap_or_default(),
    duration_ms: elapsed.as_millis(),
  }
}

fn print_text(report: &BuildReport, published: Option<&PublishReport>, elapsed: Duration) {
  println!();
  if report.is_success() {
    print_success("Build complete!");
  } else {
    print_error("Build finished with failures");
  }

  for artifact in report.requested() {
    println!("  {} {}", symbols::ARROW, artifact.name);
  }

  print_stat("Built", &report.built.len().to_string());
  print_stat("Cached", &report.cached.len().to_string());
  print_stat("Failed", &report.failed.len().to_string());
  print_stat("Skipped", &report.skipped.len().to_string());
  print_stat("Duration", &format_duration(elapsed));

  for failure in &report.failed {
    print_error(&format!("{}: {}", failure.instance, failure.error));
  }
  for (key, reason) in &report.skipped {
    print_warning(&format!("{} skipped: {}", key, reason));
  }

  if let Some(published) = published {
    println!();
    for artifact in published.published() {
      print_info(&format!("Published {}", artifact.location));
    }
    for failure in published.failures() {
      print_error(&format!("Failed to publish {} to {}: {}", failure.name, failure.destination, failure.error));
    }
  }
}
