//! Types for publishing built artifacts.

use std::io;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::execute::types::num_cpus;
use crate::output::Output;

/// One artifact to transfer to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishJob {
  /// Canonical name, used as the file name at the destination.
  pub name: String,
  pub output: Output,
  /// Destination URI: `file://`, `http(s)://` or a bare path.
  pub destination: String,
  /// Permits this job holds while running. Clamped to the coordinator's
  /// capacity.
  pub weight: u32,
}

impl PublishJob {
  pub fn new(name: &str, output: Output, destination: &str) -> Self {
    Self {
      name: name.to_string(),
      output,
      destination: destination.to_string(),
      weight: 1,
    }
  }

  pub fn with_weight(mut self, weight: u32) -> Self {
    self.weight = weight;
    self
  }
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
  /// Maximum total weight of jobs in flight.
  pub parallelism: usize,
}

impl Default for PublishConfig {
  fn default() -> Self {
    Self { parallelism: num_cpus() }
  }
}

#[derive(Debug, Error)]
pub enum PublishError {
  #[error("unsupported destination scheme in '{destination}'")]
  UnsupportedScheme { destination: String },

  #[error("failed to publish '{name}' to '{location}': {source}")]
  Io {
    name: String,
    location: String,
    #[source]
    source: io::Error,
  },

  #[error("request to '{url}' failed: {message}")]
  Http { url: String, message: String },

  #[error("'{url}' rejected upload with status {status}")]
  Status { url: String, status: u16 },

  #[error("publish task for '{0}' did not complete")]
  TaskLost(String),
}

/// Where a job's output ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedArtifact {
  pub name: String,
  pub location: String,
  /// SHA-256 of the published file; directories carry none.
  pub checksum: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PublishFailure {
  pub name: String,
  pub destination: String,
  pub error: Arc<PublishError>,
}

/// Outcome of every job, in the order the jobs were submitted.
#[derive(Debug, Default)]
pub struct PublishReport {
  pub results: Vec<Result<PublishedArtifact, PublishFailure>>,
}

impl PublishReport {
  pub fn is_success(&self) -> bool {
    self.results.iter().all(Result::is_ok)
  }

  pub fn published(&self) -> impl Iterator<Item = &PublishedArtifact> {
    self.results.iter().filter_map(|r| r.as_ref().ok())
  }

  pub fn failures(&self) -> impl Iterator<Item = &PublishFailure> {
    self.results.iter().filter_map(|r| r.as_ref().err())
  }

  /// The first failure in job order.
  pub fn first_error(&self) -> Option<&PublishFailure> {
    self.failures().next()
  }
}
