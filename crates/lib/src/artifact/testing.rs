//! Artifact fixtures for unit tests.

use async_trait::async_trait;

use super::registry::Registry;
use super::types::{Artifact, ArtifactContext, ArtifactHandler};
use crate::execute::{BuildEnv, BuildPlan, ExecuteError};
use crate::output::OutputKind;

/// Names instances after their artifact and options; builds nothing.
pub struct Noop(pub OutputKind);

#[async_trait]
impl ArtifactHandler for Noop {
  async fn filename(&self, ctx: &ArtifactContext) -> Result<String, ExecuteError> {
    Ok(format!("{}[{}]", ctx.artifact, ctx.options))
  }

  async fn build(&self, _ctx: &ArtifactContext, env: BuildEnv) -> Result<BuildPlan, ExecuteError> {
    Ok(env.capture("out", self.0))
  }
}

pub fn noop(name: &str, kind: OutputKind) -> Artifact {
  Artifact::new(name, kind, Noop(kind))
}

pub fn registry_of(artifacts: Vec<Artifact>) -> Registry {
  let mut registry = Registry::new();
  for artifact in artifacts {
    registry.register(artifact).unwrap();
  }
  registry
}
