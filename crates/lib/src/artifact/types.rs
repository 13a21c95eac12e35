use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::arguments::{Argument, ArgumentError, ArgumentResolver, ArgumentValue};
use crate::execute::{BuildEnv, BuildPlan, ExecuteError};
use crate::options::{FlagToken, Options};
use crate::output::{DirectoryHandle, Output, OutputKind};
use crate::platform::{Distribution, Os};
use crate::publish::PublishJob;

/// Platform predicate used to filter the requested artifact list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Constraint {
  #[default]
  Any,
  /// Only buildable for this operating system.
  Os(Os),
  /// Buildable for anything but this operating system.
  NotOs(Os),
}

impl Constraint {
  /// Whether an artifact with `options` can be built in a run targeting
  /// `targets`. An artifact without a distribution matches if any target does.
  pub fn allows(&self, options: &Options, targets: &[Distribution]) -> bool {
    let accepts = |distro: &Distribution| match self {
      Self::Any => true,
      Self::Os(os) => distro.os_kind() == Some(*os),
      Self::NotOs(os) => distro.os_kind() != Some(*os),
    };

    match options.distribution() {
      Some(distro) => accepts(distro),
      None => matches!(self, Self::Any) || targets.iter().any(accepts),
    }
  }
}

impl fmt::Display for Constraint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Any => write!(f, "any"),
      Self::Os(os) => write!(f, "{}-only", os),
      Self::NotOs(os) => write!(f, "not-{}", os),
    }
  }
}

/// The output of a required artifact, as seen by its dependent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredOutput {
  /// Registry name of the required artifact (e.g. "backend").
  pub artifact: String,
  /// Its canonical name.
  pub name: String,
  pub output: Output,
}

/// Everything an artifact handler sees while naming or building one instance.
#[derive(Clone)]
pub struct ArtifactContext {
  pub artifact: String,
  pub options: Options,
  pub requires: Vec<RequiredOutput>,
  arguments: Vec<Argument>,
  resolver: Arc<ArgumentResolver>,
}

impl ArtifactContext {
  pub fn new(artifact: &Artifact, resolver: Arc<ArgumentResolver>, requires: Vec<RequiredOutput>) -> Self {
    Self {
      artifact: artifact.name.clone(),
      options: artifact.options.clone(),
      requires,
      arguments: artifact.arguments.clone(),
      resolver,
    }
  }

  /// Resolve one of the artifact's declared arguments.
  pub async fn argument(&self, argument: &Argument) -> Result<ArgumentValue, ArgumentError> {
    if !self.arguments.iter().any(|a| a.name == argument.name) {
      return Err(ArgumentError::Undeclared {
        argument: self.artifact.clone(),
        requirement: argument.name.clone(),
      });
    }
    self.resolver.resolve(argument).await
  }

  pub async fn string(&self, argument: &Argument) -> Result<String, ArgumentError> {
    self.argument(argument).await?.into_string(&argument.name)
  }

  pub async fn directory(&self, argument: &Argument) -> Result<DirectoryHandle, ArgumentError> {
    self.argument(argument).await?.into_directory(&argument.name)
  }

  pub fn required(&self, artifact: &str) -> Option<&RequiredOutput> {
    self.requires.iter().find(|r| r.artifact == artifact)
  }

  pub fn distribution(&self) -> Option<&Distribution> {
    self.options.distribution()
  }
}

/// The behavior behind an artifact: how it is named, built and published.
#[async_trait]
pub trait ArtifactHandler: Send + Sync {
  /// The canonical filename of the instance described by `ctx`.
  ///
  /// Must depend only on the options and resolved arguments, since the result
  /// is the instance's cache key.
  async fn filename(&self, ctx: &ArtifactContext) -> Result<String, ExecuteError>;

  /// Prepare the build environment. The default stages every required output
  /// in a directory named after the required artifact.
  async fn builder(&self, ctx: &ArtifactContext) -> Result<BuildEnv, ExecuteError> {
    Ok(
      ctx
        .requires
        .iter()
        .fold(BuildEnv::new(), |env, required| env.stage(required.output.clone(), &required.artifact)),
    )
  }

  /// Add the build steps and capture to `env`.
  async fn build(&self, ctx: &ArtifactContext, env: BuildEnv) -> Result<BuildPlan, ExecuteError>;

  /// Whether this artifact is published at all. Intermediate outputs such as
  /// compiled binaries usually are not.
  fn publisher(&self) -> bool {
    true
  }

  fn publish(&self, name: &str, output: &Output, destination: &str) -> PublishJob {
    PublishJob::new(name, output.clone(), destination)
  }
}

/// A registered artifact, or a parametrized copy of one.
#[derive(Clone)]
pub struct Artifact {
  pub name: String,
  pub kind: OutputKind,
  /// Registry names of the artifacts this one is built from.
  pub requires: Vec<String>,
  pub arguments: Vec<Argument>,
  pub flags: Vec<FlagToken>,
  pub options: Options,
  pub constraint: Constraint,
  handler: Arc<dyn ArtifactHandler>,
}

impl Artifact {
  pub fn new(name: &str, kind: OutputKind, handler: impl ArtifactHandler + 'static) -> Self {
    Self {
      name: name.to_string(),
      kind,
      requires: Vec::new(),
      arguments: Vec::new(),
      flags: Vec::new(),
      options: Options::new(),
      constraint: Constraint::Any,
      handler: Arc::new(handler),
    }
  }

  pub fn requires(mut self, requires: &[&str]) -> Self {
    self.requires = requires.iter().map(|r| r.to_string()).collect();
    self
  }

  pub fn arguments(mut self, arguments: Vec<Argument>) -> Self {
    self.arguments = arguments;
    self
  }

  pub fn flags(mut self, flags: Vec<FlagToken>) -> Self {
    self.flags = flags;
    self
  }

  pub fn options(mut self, options: Options) -> Self {
    self.options = options;
    self
  }

  pub fn constraint(mut self, constraint: Constraint) -> Self {
    self.constraint = constraint;
    self
  }

  pub fn handler(&self) -> &Arc<dyn ArtifactHandler> {
    &self.handler
  }

  pub fn flag(&self, name: &str) -> Option<&FlagToken> {
    self.flags.iter().find(|f| f.name == name)
  }

  /// Whether any of this artifact's flags select a platform.
  pub fn offers_distribution(&self) -> bool {
    self.flags.iter().any(FlagToken::sets_distribution)
  }

  pub fn key(&self) -> InstanceKey {
    InstanceKey {
      name: self.name.clone(),
      options: self.options.clone(),
    }
  }
}

impl fmt::Debug for Artifact {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Artifact")
      .field("name", &self.name)
      .field("kind", &self.kind)
      .field("requires", &self.requires)
      .field("arguments", &self.arguments.iter().map(|a| &a.name).collect::<Vec<_>>())
      .field("flags", &self.flags.iter().map(|f| &f.name).collect::<Vec<_>>())
      .field("options", &self.options)
      .field("constraint", &self.constraint)
      .finish()
  }
}

/// Identity of a parametrized artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct InstanceKey {
  pub name: String,
  pub options: Options,
}

impl fmt::Display for InstanceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.options.is_empty() {
      write!(f, "{}", self.name)
    } else {
      write!(f, "{}[{}]", self.name, self.options)
    }
  }
}

/// One entry of the final artifact list.
#[derive(Debug, Clone)]
pub struct ArtifactInstance {
  pub artifact: Artifact,
  /// False for artifacts only pulled in as requirements.
  pub requested: bool,
  /// Keys of the instances this one is built from, in declaration order.
  pub requires: Vec<InstanceKey>,
}

impl ArtifactInstance {
  pub fn key(&self) -> InstanceKey {
    self.artifact.key()
  }

  pub fn name(&self) -> &str {
    &self.artifact.name
  }

  pub fn options(&self) -> &Options {
    &self.artifact.options
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::options::OptionKey;

  fn linux() -> Distribution {
    Distribution::new("linux", "amd64")
  }

  fn windows() -> Distribution {
    Distribution::new("windows", "amd64")
  }

  #[test]
  fn os_constraint_uses_the_instance_distribution() {
    let on_windows = Options::new().with(OptionKey::Distribution, windows());
    assert!(Constraint::Os(Os::Windows).allows(&on_windows, &[linux()]));
    assert!(!Constraint::Os(Os::Linux).allows(&on_windows, &[linux()]));
    assert!(!Constraint::NotOs(Os::Windows).allows(&on_windows, &[]));
  }

  #[test]
  fn platformless_instances_match_any_target() {
    let none = Options::new();
    assert!(Constraint::Os(Os::Linux).allows(&none, &[windows(), linux()]));
    assert!(!Constraint::Os(Os::Linux).allows(&none, &[windows()]));
    assert!(Constraint::NotOs(Os::Windows).allows(&none, &[linux()]));
    assert!(Constraint::Any.allows(&none, &[]));
  }

  #[test]
  fn instance_key_display() {
    let key = InstanceKey {
      name: "targz".to_string(),
      options: Options::new().with(OptionKey::Distribution, linux()).with(OptionKey::Static, true),
    };
    assert_eq!(key.to_string(), "targz[distribution=linux/amd64 static=true]");
    assert_eq!(Constraint::Os(Os::Linux).to_string(), "linux-only");
  }
}
