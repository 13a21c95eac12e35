//! Shared fixtures for integration tests.
//!
//! A two-artifact registry whose builds are shell scripts: `notes` produces a
//! directory shared by every platform and `bundle` packs it per platform.

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use relgraph_lib::arguments::{Argument, ArgumentError, ArgumentKind, ArgumentResolver, ArgumentValue, ResolveCtx};
use relgraph_lib::artifact::{Artifact, ArtifactContext, ArtifactHandler, ArtifactInstance, Registry};
use relgraph_lib::config::RunOptions;
use relgraph_lib::execute::{BuildEnv, BuildPlan, Exec, ExecuteConfig, ExecuteError, Orchestrator, ProcessExecutor};
use relgraph_lib::naming::encode_parts;
use relgraph_lib::options::distribution_flags;
use relgraph_lib::output::OutputKind;
use relgraph_lib::store::ArtifactStore;

pub fn shell(script: &str) -> Exec {
  Exec::new("/bin/sh").args(["-c", script])
}

pub fn version_argument() -> Argument {
  Argument::new("version", ArgumentKind::String, |ctx: ResolveCtx| async move {
    ctx
      .var("version")
      .map(|v| ArgumentValue::String(v.to_string()))
      .ok_or_else(|| ArgumentError::failed("version", "version is not set"))
  })
}

async fn name(ctx: &ArtifactContext, version: &Argument, ext: &str) -> Result<String, ExecuteError> {
  let version = ctx.string(version).await?;
  let (os, arch, variant) = match ctx.distribution() {
    Some(d) => (d.os.as_str(), d.arch.as_str(), d.variant.as_deref()),
    None => ("any", "any", None),
  };
  Ok(encode_parts("demo", &version, "1", os, arch, variant, ext))
}

pub struct Notes {
  pub version: Argument,
}

#[async_trait]
impl ArtifactHandler for Notes {
  async fn filename(&self, ctx: &ArtifactContext) -> Result<String, ExecuteError> {
    name(ctx, &self.version, "notes").await
  }

  async fn build(&self, ctx: &ArtifactContext, env: BuildEnv) -> Result<BuildPlan, ExecuteError> {
    let version = ctx.string(&self.version).await?;
    Ok(
      env
        .exec(shell(&format!("mkdir -p notes && printf '%s' 'release {}' > notes/README", version)))
        .capture("notes", OutputKind::Directory),
    )
  }

  fn publisher(&self) -> bool {
    false
  }
}

pub struct Bundle {
  pub version: Argument,
  /// Build fails for this os.
  pub broken_on: Option<&'static str>,
}

#[async_trait]
impl ArtifactHandler for Bundle {
  async fn filename(&self, ctx: &ArtifactContext) -> Result<String, ExecuteError> {
    name(ctx, &self.version, "txt").await
  }

  async fn build(&self, ctx: &ArtifactContext, env: BuildEnv) -> Result<BuildPlan, ExecuteError> {
    let distro = ctx
      .distribution()
      .ok_or_else(|| ExecuteError::build(&ctx.artifact, "no distribution"))?;
    let script = if self.broken_on == Some(distro.os.as_str()) {
      "exit 3".to_string()
    } else {
      format!("cat notes/README > bundle.txt && printf ' for %s' '{}' >> bundle.txt", distro)
    };
    Ok(env.exec(shell(&script)).capture("bundle.txt", OutputKind::File))
  }
}

pub fn registry(broken_on: Option<&'static str>) -> Registry {
  let version = version_argument();
  let mut registry = Registry::new();
  registry
    .register(
      Artifact::new(
        "notes",
        OutputKind::Directory,
        Notes {
          version: version.clone(),
        },
      )
      .arguments(vec![version.clone()]),
    )
    .unwrap();
  registry
    .register(
      Artifact::new(
        "bundle",
        OutputKind::File,
        Bundle {
          version: version.clone(),
          broken_on,
        },
      )
      .requires(&["notes"])
      .arguments(vec![version])
      .flags(distribution_flags()),
    )
    .unwrap();
  registry
}

pub fn run(targets: &[&str]) -> RunOptions {
  RunOptions::default()
    .with_targets(targets.iter().map(|t| t.parse().unwrap()).collect())
    .with_var("version", "v2.0.0")
}

/// An isolated work directory with an orchestrator over a shared store.
pub struct TestEnv {
  pub temp: TempDir,
  pub store: Arc<ArtifactStore>,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
      store: Arc::new(ArtifactStore::new()),
    }
  }

  pub fn orchestrator(&self, run: &RunOptions) -> Arc<Orchestrator> {
    let config = ExecuteConfig {
      parallelism: 2,
      work_dir: self.temp.path().join("work"),
      fail_fast: false,
    };
    let executor = Arc::new(ProcessExecutor::from_config(&config));
    Arc::new(Orchestrator::new(
      Arc::clone(&self.store),
      ArgumentResolver::new(run),
      executor,
      config,
    ))
  }

  pub fn plan(&self, registry: &Registry, descriptors: &[&str], run: &RunOptions) -> Vec<ArtifactInstance> {
    registry.final_artifact_list(descriptors, run).unwrap()
  }
}
