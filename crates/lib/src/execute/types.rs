//! Types for build execution.
//!
//! This module defines the error types, report types and configuration for
//! building a resolved artifact list.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::arguments::ArgumentError;
use crate::artifact::InstanceKey;
use crate::consts::{APP_NAME, WORK_DIR_ENV};
use crate::output::{Output, OutputKind};
use crate::store::StoreError;

/// Why an instance was not built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "artifact", rename_all = "kebab-case")]
pub enum SkipReason {
  /// A required instance failed or was itself skipped.
  FailedDependency(InstanceKey),
  /// The run was cancelled before the instance was scheduled.
  Cancelled,
}

impl std::fmt::Display for SkipReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      SkipReason::FailedDependency(key) => write!(f, "dependency {} failed", key),
      SkipReason::Cancelled => write!(f, "cancelled"),
    }
  }
}

/// Errors that can occur during build execution.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// An argument needed to name or build the artifact failed to resolve.
  #[error(transparent)]
  Argument(#[from] ArgumentError),

  #[error(transparent)]
  Store(#[from] StoreError),

  /// An artifact handler refused to produce a plan.
  #[error("artifact '{artifact}': {message}")]
  Build { artifact: String, message: String },

  /// Command execution failed.
  #[error("command failed with exit code {code:?}: {cmd}")]
  CmdFailed { cmd: String, code: Option<i32> },

  /// The plan finished but did not leave the captured output behind.
  #[error("build did not produce {kind} {}", path.display())]
  CaptureMissing { path: PathBuf, kind: OutputKind },

  /// The captured output is not the kind the artifact declares.
  #[error("artifact '{artifact}' declares a {expected} output but its build produced a {found}")]
  OutputKind {
    artifact: String,
    expected: OutputKind,
    found: OutputKind,
  },

  /// A staging target or working directory escapes the plan's work directory.
  #[error("path {} must be relative to the work directory", .0.display())]
  InvalidPath(PathBuf),

  /// An instance lists a requirement that is not in the artifact list.
  #[error("artifact {artifact} requires {requirement}, which is not in the artifact list")]
  MissingRequirement { artifact: String, requirement: String },

  /// Cycle detected in the dependency graph.
  #[error("dependency cycle detected")]
  CycleDetected,

  /// The build task ended without reporting a result.
  #[error("build task for {0} did not complete")]
  TaskLost(String),

  /// I/O error during execution.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl ExecuteError {
  pub fn build(artifact: &str, message: impl std::fmt::Display) -> Self {
    Self::Build {
      artifact: artifact.to_string(),
      message: message.to_string(),
    }
  }
}

/// An instance whose output is available in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltArtifact {
  pub instance: InstanceKey,
  /// Canonical name the output is stored under.
  pub name: String,
  pub output: Output,
  pub requested: bool,
}

/// A failed instance and its error. The error is shared with every instance
/// that resolved to the same canonical name.
#[derive(Debug, Clone)]
pub struct FailedArtifact {
  pub instance: InstanceKey,
  pub error: Arc<ExecuteError>,
}

/// Result of building an artifact list.
#[derive(Debug, Default)]
pub struct BuildReport {
  /// Instances whose build ran in this pass.
  pub built: Vec<BuiltArtifact>,

  /// Instances whose canonical name was already stored or built by another
  /// instance.
  pub cached: Vec<BuiltArtifact>,

  pub failed: Vec<FailedArtifact>,

  /// Instances that were never started.
  pub skipped: Vec<(InstanceKey, SkipReason)>,
}

impl BuildReport {
  pub fn is_success(&self) -> bool {
    self.failed.is_empty() && self.skipped.is_empty()
  }

  pub fn total(&self) -> usize {
    self.built.len() + self.cached.len() + self.failed.len() + self.skipped.len()
  }

  /// Every available output, built or cached.
  pub fn outputs(&self) -> impl Iterator<Item = &BuiltArtifact> {
    self.built.iter().chain(self.cached.iter())
  }

  /// Available outputs of the instances the user asked for.
  pub fn requested(&self) -> impl Iterator<Item = &BuiltArtifact> {
    self.outputs().filter(|b| b.requested)
  }

  pub fn first_error(&self) -> Option<&FailedArtifact> {
    self.failed.first()
  }
}

/// Configuration for build execution.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Maximum number of builds to execute in parallel.
  pub parallelism: usize,

  /// Root under which each build gets its own work directory.
  pub work_dir: PathBuf,

  /// Cancel the run on the first failed build instead of only skipping its
  /// dependents.
  pub fail_fast: bool,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
      work_dir: default_work_dir(),
      fail_fast: false,
    }
  }
}

/// `$RELGRAPH_WORK_DIR`, or `relgraph` under the system temp directory.
pub fn default_work_dir() -> PathBuf {
  std::env::var_os(WORK_DIR_ENV)
    .filter(|v| !v.is_empty())
    .map(PathBuf::from)
    .unwrap_or_else(|| std::env::temp_dir().join(APP_NAME))
}

/// Get the number of CPUs for default parallelism.
pub fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

/// Clamp a requested parallelism to what a semaphore can hold, with room for
/// `u32` permit counts.
pub fn bounded_parallelism(parallelism: usize) -> usize {
  parallelism.clamp(1, Semaphore::MAX_PERMITS.min(u32::MAX as usize))
}
