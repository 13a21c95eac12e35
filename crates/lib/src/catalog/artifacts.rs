//! Standard artifact handlers.
//!
//! `backend` and `frontend` compile the product; every package artifact is
//! assembled from the tarball, which is assembled from those two.

use async_trait::async_trait;

use super::arguments::StandardArguments;
use crate::artifact::{ArtifactContext, ArtifactHandler};
use crate::execute::{BuildEnv, BuildPlan, Exec, ExecuteError};
use crate::naming::encode_parts;
use crate::options::{OptionKey, Options};
use crate::output::{Output, OutputKind};
use crate::platform::Distribution;
use crate::publish::PublishJob;

const DEFAULT_PRODUCT: &str = "grafana";

/// Name field of a canonical filename.
///
/// Dynamically linked builds are named apart from static ones. Package
/// artifacts also append the distribution's name suffix (`-rpi`).
fn product_name(options: &Options, with_suffix: bool) -> String {
  let mut name = options
    .string(OptionKey::ProductName)
    .unwrap_or(DEFAULT_PRODUCT)
    .to_string();
  if options.bool(OptionKey::Static) == Some(false) {
    name.push_str("-dynamic");
  }
  if with_suffix && let Some(suffix) = options.string(OptionKey::NameSuffix) {
    name.push('-');
    name.push_str(suffix);
  }
  name
}

fn distribution(ctx: &ArtifactContext) -> Result<&Distribution, ExecuteError> {
  ctx
    .distribution()
    .ok_or_else(|| ExecuteError::build(&ctx.artifact, "no distribution selected"))
}

/// Version without its `v` prefix, as package managers expect it.
fn package_version(version: &str) -> &str {
  version.strip_prefix('v').unwrap_or(version)
}

/// Every required output, staged under its artifact name.
fn stage_requires(ctx: &ArtifactContext) -> BuildEnv {
  ctx
    .requires
    .iter()
    .fold(BuildEnv::new(), |env, r| env.stage(r.output.clone(), &r.artifact))
}

async fn canonical_name(
  ctx: &ArtifactContext,
  args: &StandardArguments,
  with_suffix: bool,
  extension: &str,
) -> Result<String, ExecuteError> {
  let version = ctx.string(&args.version).await?;
  let build_id = ctx.string(&args.build_id).await?;
  let distro = distribution(ctx)?;
  Ok(encode_parts(
    &product_name(&ctx.options, with_suffix),
    &version,
    &build_id,
    &distro.os,
    &distro.arch,
    distro.variant.as_deref(),
    extension,
  ))
}

/// Compiled server binaries for one distribution.
pub struct Backend {
  pub args: StandardArguments,
}

#[async_trait]
impl ArtifactHandler for Backend {
  async fn filename(&self, ctx: &ArtifactContext) -> Result<String, ExecuteError> {
    canonical_name(ctx, &self.args, false, "backend").await
  }

  async fn builder(&self, ctx: &ArtifactContext) -> Result<BuildEnv, ExecuteError> {
    let source = ctx.directory(&self.args.source_dir).await?;
    let mut env = BuildEnv::new().stage(Output::Directory(source), "src");
    if ctx.options.bool(OptionKey::Enterprise) == Some(true) {
      let enterprise = ctx.directory(&self.args.enterprise_dir).await?;
      env = env.stage(Output::Directory(enterprise), "src/pkg/extensions");
    }
    Ok(env)
  }

  async fn build(&self, ctx: &ArtifactContext, env: BuildEnv) -> Result<BuildPlan, ExecuteError> {
    let distro = distribution(ctx)?;
    let version = ctx.string(&self.args.version).await?;
    let go = go_build(&distro, &ctx.options, &version);
    Ok(env.exec(go).capture("bin", OutputKind::Directory))
  }

  fn publisher(&self) -> bool {
    false
  }
}

/// The `go build` invocation for the backend binaries.
///
/// cgo stays on in both link modes. Static builds hand the final link to the
/// C toolchain (`-linkmode=external`), which Go refuses without cgo, and
/// dynamic builds exist to link against the system libc.
fn go_build(distro: &Distribution, options: &Options, version: &str) -> Exec {
  let linked_static = options.bool(OptionKey::Static).unwrap_or(true);
  let tags = options.list(OptionKey::BuildTags).join(",");

  let mut ldflags = format!("-X main.version={}", package_version(version));
  if linked_static {
    ldflags.push_str(" -linkmode=external -extldflags=-static");
  }

  let mut go = Exec::new("go")
    .args(["build", "-trimpath", "-o", "../bin/"])
    .args(["-tags".to_string(), tags, "-ldflags".to_string(), ldflags])
    .arg("./pkg/cmd/...")
    .cwd("src")
    .env("GOOS", &distro.os)
    .env("GOARCH", &distro.arch)
    .env("CGO_ENABLED", "1")
    .env("GOEXPERIMENT", options.list(OptionKey::Experiments).join(","));
  if let Some(variant) = &distro.variant {
    go = go.env("GOARM", variant.trim_start_matches('v'));
  }
  go
}

/// Compiled web assets. The same for every distribution.
pub struct Frontend {
  pub args: StandardArguments,
}

#[async_trait]
impl ArtifactHandler for Frontend {
  async fn filename(&self, ctx: &ArtifactContext) -> Result<String, ExecuteError> {
    let version = ctx.string(&self.args.version).await?;
    let build_id = ctx.string(&self.args.build_id).await?;
    let product = ctx.options.string(OptionKey::ProductName).unwrap_or(DEFAULT_PRODUCT);
    Ok(encode_parts(product, &version, &build_id, "any", "any", None, "frontend"))
  }

  async fn builder(&self, ctx: &ArtifactContext) -> Result<BuildEnv, ExecuteError> {
    let source = ctx.directory(&self.args.source_dir).await?;
    Ok(BuildEnv::new().stage(Output::Directory(source), "src"))
  }

  async fn build(&self, _ctx: &ArtifactContext, env: BuildEnv) -> Result<BuildPlan, ExecuteError> {
    Ok(
      env
        .exec(Exec::new("yarn").args(["install", "--immutable"]).cwd("src"))
        .exec(Exec::new("yarn").args(["run", "build"]).cwd("src").env("NODE_ENV", "production"))
        .capture("src/public/build", OutputKind::Directory),
    )
  }

  fn publisher(&self) -> bool {
    false
  }
}

/// `tar.gz` of the backend binaries and frontend assets.
pub struct Tarball {
  pub args: StandardArguments,
}

#[async_trait]
impl ArtifactHandler for Tarball {
  async fn filename(&self, ctx: &ArtifactContext) -> Result<String, ExecuteError> {
    canonical_name(ctx, &self.args, true, "tar.gz").await
  }

  async fn build(&self, ctx: &ArtifactContext, env: BuildEnv) -> Result<BuildPlan, ExecuteError> {
    let name = self.filename(ctx).await?;
    let tar = Exec::new("tar")
      .args(["--owner=0", "--group=0", "--numeric-owner", "-czf"])
      .args([name.as_str(), "backend", "frontend"]);
    Ok(env.exec(tar).capture(name, OutputKind::File))
  }
}

/// Which OS package format a [`Package`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFormat {
  Deb,
  Rpm,
}

impl PackageFormat {
  fn as_str(&self) -> &'static str {
    match self {
      Self::Deb => "deb",
      Self::Rpm => "rpm",
    }
  }

  /// Architecture name the package manager uses.
  fn arch(&self, distro: &Distribution) -> String {
    match (self, distro.arch.as_str(), distro.variant.as_deref()) {
      (Self::Deb, "arm", Some("v6" | "v7")) => "armhf".to_string(),
      (Self::Rpm, "amd64", _) => "x86_64".to_string(),
      (Self::Rpm, "arm64", _) => "aarch64".to_string(),
      (Self::Rpm, "arm", Some("v7")) => "armhfp".to_string(),
      (_, arch, _) => arch.to_string(),
    }
  }
}

/// An OS package built from the tarball with fpm.
pub struct Package {
  pub args: StandardArguments,
  pub format: PackageFormat,
}

#[async_trait]
impl ArtifactHandler for Package {
  async fn filename(&self, ctx: &ArtifactContext) -> Result<String, ExecuteError> {
    canonical_name(ctx, &self.args, true, self.format.as_str()).await
  }

  async fn build(&self, ctx: &ArtifactContext, env: BuildEnv) -> Result<BuildPlan, ExecuteError> {
    let name = self.filename(ctx).await?;
    let version = ctx.string(&self.args.version).await?;
    let distro = distribution(ctx)?;

    let fpm = Exec::new("fpm")
      .args(["-s", "tar", "-t", self.format.as_str()])
      .arg("--name")
      .arg(product_name(&ctx.options, true))
      .arg("--version")
      .arg(package_version(&version))
      .arg("--architecture")
      .arg(self.format.arch(distro))
      .arg("--package")
      .arg(name.as_str())
      .arg("targz");
    Ok(env.exec(fpm).capture(name, OutputKind::File))
  }
}

/// A container image saved as a tarball.
pub struct Docker {
  pub args: StandardArguments,
  /// Build on Ubuntu instead of Alpine.
  pub ubuntu: bool,
}

impl Docker {
  fn extension(&self) -> &'static str {
    if self.ubuntu { "ubuntu.docker.tar.gz" } else { "docker.tar.gz" }
  }
}

#[async_trait]
impl ArtifactHandler for Docker {
  async fn filename(&self, ctx: &ArtifactContext) -> Result<String, ExecuteError> {
    canonical_name(ctx, &self.args, true, self.extension()).await
  }

  async fn builder(&self, ctx: &ArtifactContext) -> Result<BuildEnv, ExecuteError> {
    let source = ctx.directory(&self.args.source_dir).await?;
    let dockerfile = Output::file(source.0.join("Dockerfile"));
    Ok(stage_requires(ctx).stage(dockerfile, "Dockerfile"))
  }

  async fn build(&self, ctx: &ArtifactContext, env: BuildEnv) -> Result<BuildPlan, ExecuteError> {
    let name = self.filename(ctx).await?;
    let version = ctx.string(&self.args.version).await?;
    let distro = distribution(ctx)?;
    let base = if self.ubuntu { "ubuntu:22.04" } else { "alpine:3.18" };
    let tag = format!("grafana/{}:{}", product_name(&ctx.options, false), package_version(&version));

    let docker = Exec::new("docker")
      .args(["buildx", "build", "--platform"])
      .arg(distro.to_string())
      .args(["--build-arg".to_string(), format!("BASE_IMAGE={}", base)])
      .args(["--build-arg", "GRAFANA_TGZ=targz", "--tag"])
      .arg(tag)
      .arg("--output")
      .arg(format!("type=docker,dest={}", name))
      .arg(".");
    Ok(env.exec(docker).capture(name, OutputKind::File))
  }

  fn publish(&self, name: &str, output: &Output, destination: &str) -> PublishJob {
    PublishJob::new(name, output.clone(), destination).with_weight(2)
  }
}

/// NSIS installer built from the tarball.
pub struct WindowsInstaller {
  pub args: StandardArguments,
}

#[async_trait]
impl ArtifactHandler for WindowsInstaller {
  async fn filename(&self, ctx: &ArtifactContext) -> Result<String, ExecuteError> {
    canonical_name(ctx, &self.args, true, "exe").await
  }

  async fn builder(&self, ctx: &ArtifactContext) -> Result<BuildEnv, ExecuteError> {
    let source = ctx.directory(&self.args.source_dir).await?;
    let script = Output::file(source.0.join("scripts/build/ci-windows/grafana.nsi"));
    Ok(stage_requires(ctx).stage(script, "grafana.nsi"))
  }

  async fn build(&self, ctx: &ArtifactContext, env: BuildEnv) -> Result<BuildPlan, ExecuteError> {
    let name = self.filename(ctx).await?;
    let version = ctx.string(&self.args.version).await?;

    let makensis = Exec::new("makensis")
      .arg("-DGRAFANA_TGZ=targz")
      .arg(format!("-DGRAFANA_VERSION={}", package_version(&version)))
      .arg(format!("-DPRODUCT_NAME={}", product_name(&ctx.options, false)))
      .arg(format!("-DOUTFILE={}", name))
      .arg("grafana.nsi");
    Ok(env.exec(makensis).capture(name, OutputKind::File))
  }
}
