//! Build action execution.
//!
//! [`ActionExecutor`] is the seam between the orchestrator and whatever
//! actually performs builds. [`ProcessExecutor`] is the local implementation:
//! every plan runs in its own work directory, staged inputs are copied in, and
//! exec steps run as child processes.

pub mod cmd;

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::execute::plan::{BuildPlan, BuildStep};
use crate::execute::types::{ExecuteConfig, ExecuteError};
use crate::output::{Output, OutputKind};
use crate::util::fs::copy_path;

pub use cmd::execute_cmd;

/// Carries out a build plan and returns the captured output.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
  /// Execute `plan` for the artifact with canonical name `name`.
  async fn execute(&self, name: &str, plan: &BuildPlan) -> Result<Output, ExecuteError>;
}

/// Runs plans as local processes under a work directory root.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
  root: PathBuf,
}

impl ProcessExecutor {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn from_config(config: &ExecuteConfig) -> Self {
    Self::new(&config.work_dir)
  }

  /// Work directory of the plan for `name`.
  pub fn work_dir(&self, name: &str) -> PathBuf {
    self.root.join(dir_name(name))
  }
}

#[async_trait]
impl ActionExecutor for ProcessExecutor {
  async fn execute(&self, name: &str, plan: &BuildPlan) -> Result<Output, ExecuteError> {
    let work_dir = self.work_dir(name);
    if tokio::fs::try_exists(&work_dir).await? {
      tokio::fs::remove_dir_all(&work_dir).await?;
    }
    tokio::fs::create_dir_all(&work_dir).await?;

    debug!(artifact = %name, work_dir = %work_dir.display(), steps = plan.steps.len(), "executing plan");

    for step in &plan.steps {
      match step {
        BuildStep::Stage { source, target } => {
          let target = work_dir.join(relative(target)?);
          debug!(source = %source.path().display(), target = %target.display(), "staging input");
          copy_path(source.path().to_path_buf(), target).await?;
        }
        BuildStep::Exec(exec) => {
          if let Some(cwd) = &exec.cwd {
            relative(cwd)?;
          }
          execute_cmd(exec, &work_dir).await?;
        }
      }
    }

    let captured = work_dir.join(relative(&plan.capture.path)?);
    let found = match tokio::fs::metadata(&captured).await {
      Ok(meta) if meta.is_dir() => Some(OutputKind::Directory),
      Ok(_) => Some(OutputKind::File),
      Err(_) => None,
    };
    if found != Some(plan.capture.kind) {
      return Err(ExecuteError::CaptureMissing {
        path: plan.capture.path.clone(),
        kind: plan.capture.kind,
      });
    }

    info!(artifact = %name, output = %captured.display(), "plan complete");
    Ok(match plan.capture.kind {
      OutputKind::File => Output::file(captured),
      OutputKind::Directory => Output::directory(captured),
    })
  }
}

/// Reject absolute paths and `..` so steps stay inside the work directory.
fn relative(path: &Path) -> Result<&Path, ExecuteError> {
  let escapes = path
    .components()
    .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
  if escapes {
    Err(ExecuteError::InvalidPath(path.to_path_buf()))
  } else {
    Ok(path)
  }
}

fn dir_name(name: &str) -> String {
  name
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
    .collect()
}
