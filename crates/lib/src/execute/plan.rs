//! Declarative build plans.
//!
//! An artifact does not build itself. Its handler describes the work as a
//! [`BuildPlan`]: stage the outputs it depends on into a fresh work directory,
//! run some processes there, and capture one path as the result. An
//! [`ActionExecutor`](super::actions::ActionExecutor) carries the plan out.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::output::{Output, OutputKind};

/// A process invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exec {
  pub program: String,
  pub args: Vec<String>,
  pub env: BTreeMap<String, String>,
  /// Working directory relative to the plan's work directory.
  pub cwd: Option<PathBuf>,
}

impl Exec {
  pub fn new(program: &str) -> Self {
    Self {
      program: program.to_string(),
      args: Vec::new(),
      env: BTreeMap::new(),
      cwd: None,
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
    self.env.insert(key.to_string(), value.into());
    self
  }

  pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  /// The command line, for logs and errors.
  pub fn command_line(&self) -> String {
    std::iter::once(self.program.as_str())
      .chain(self.args.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "lowercase")]
pub enum BuildStep {
  /// Copy an existing output to a path relative to the work directory.
  Stage { source: Output, target: PathBuf },
  Exec(Exec),
}

/// The path, relative to the work directory, holding the build result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capture {
  pub path: PathBuf,
  pub kind: OutputKind,
}

/// A build environment under construction: the staged inputs and any setup
/// steps, before the artifact's own build steps and capture are added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildEnv {
  steps: Vec<BuildStep>,
}

impl BuildEnv {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn stage(mut self, source: Output, target: impl AsRef<Path>) -> Self {
    self.steps.push(BuildStep::Stage {
      source,
      target: target.as_ref().to_path_buf(),
    });
    self
  }

  pub fn exec(mut self, exec: Exec) -> Self {
    self.steps.push(BuildStep::Exec(exec));
    self
  }

  pub fn steps(&self) -> &[BuildStep] {
    &self.steps
  }

  /// Finish the environment into a plan whose result is `path`.
  pub fn capture(self, path: impl AsRef<Path>, kind: OutputKind) -> BuildPlan {
    BuildPlan {
      steps: self.steps,
      capture: Capture {
        path: path.as_ref().to_path_buf(),
        kind,
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
  pub steps: Vec<BuildStep>,
  pub capture: Capture,
}

impl BuildPlan {
  pub fn staged(&self) -> impl Iterator<Item = (&Output, &Path)> {
    self.steps.iter().filter_map(|step| match step {
      BuildStep::Stage { source, target } => Some((source, target.as_path())),
      BuildStep::Exec(_) => None,
    })
  }
}
