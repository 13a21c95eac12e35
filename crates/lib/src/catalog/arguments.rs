//! Standard arguments: source tree, enterprise overlay, version and build id.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::arguments::{Argument, ArgumentError, ArgumentKind, ArgumentValue, ResolveCtx};
use crate::config::vars;
use crate::output::DirectoryHandle;

pub const SOURCE_DIR: &str = "source-dir";
pub const ENTERPRISE_DIR: &str = "enterprise-dir";
pub const VERSION: &str = "version";
pub const BUILD_ID: &str = "build-id";

const DEFAULT_BUILD_ID: &str = "local";

/// The standard arguments, created once per registry so every artifact shares
/// the same declarations.
#[derive(Debug, Clone)]
pub struct StandardArguments {
  pub source_dir: Argument,
  pub enterprise_dir: Argument,
  pub version: Argument,
  pub build_id: Argument,
}

impl StandardArguments {
  pub fn new() -> Self {
    let source_dir = Argument::new(SOURCE_DIR, ArgumentKind::Directory, |ctx| async move {
      let path = ctx.var(vars::SOURCE_DIR).unwrap_or(".").to_string();
      existing_dir(&ctx, &path).await
    });

    let enterprise_dir = Argument::new(ENTERPRISE_DIR, ArgumentKind::Directory, |ctx| async move {
      let Some(path) = ctx.var(vars::ENTERPRISE_DIR).map(str::to_string) else {
        return Err(ArgumentError::failed(ctx.name(), "enterprise_dir is not set"));
      };
      existing_dir(&ctx, &path).await
    });

    let version = {
      let source = source_dir.clone();
      Argument::new(VERSION, ArgumentKind::String, move |ctx| {
        let source = source.clone();
        async move {
          if let Some(version) = ctx.var(vars::VERSION) {
            return Ok(ArgumentValue::String(version.to_string()));
          }
          let dir = ctx.directory(&source).await?;
          package_version(&ctx, &dir.0).await.map(ArgumentValue::String)
        }
      })
      .requires_lazily(vec![source_dir.clone()])
    };

    let build_id = Argument::new(BUILD_ID, ArgumentKind::String, |ctx| async move {
      let id = ctx.var(vars::BUILD_ID).unwrap_or(DEFAULT_BUILD_ID);
      Ok(ArgumentValue::String(id.to_string()))
    });

    Self {
      source_dir,
      enterprise_dir,
      version,
      build_id,
    }
  }

  /// The arguments every canonical name is built from.
  pub fn naming(&self) -> Vec<Argument> {
    vec![self.version.clone(), self.build_id.clone()]
  }
}

impl Default for StandardArguments {
  fn default() -> Self {
    Self::new()
  }
}

async fn existing_dir(ctx: &ResolveCtx, path: &str) -> Result<ArgumentValue, ArgumentError> {
  let path = PathBuf::from(path);
  match tokio::fs::metadata(&path).await {
    Ok(meta) if meta.is_dir() => {
      let path = dunce::canonicalize(&path).unwrap_or(path);
      debug!(argument = %ctx.name(), path = %path.display(), "resolved directory");
      Ok(ArgumentValue::Directory(DirectoryHandle(path)))
    }
    Ok(_) => Err(ArgumentError::failed(ctx.name(), format!("'{}' is not a directory", path.display()))),
    Err(e) => Err(ArgumentError::failed(ctx.name(), format!("'{}': {}", path.display(), e))),
  }
}

#[derive(Deserialize)]
struct PackageJson {
  version: String,
}

/// `v` + the `version` field of `<source>/package.json`.
async fn package_version(ctx: &ResolveCtx, source: &Path) -> Result<String, ArgumentError> {
  let path = source.join("package.json");
  let contents = tokio::fs::read_to_string(&path)
    .await
    .map_err(|e| ArgumentError::failed(ctx.name(), format!("{}: {}", path.display(), e)))?;
  let package: PackageJson = serde_json::from_str(&contents)
    .map_err(|e| ArgumentError::failed(ctx.name(), format!("{}: {}", path.display(), e)))?;
  Ok(format!("v{}", package.version.trim_start_matches('v')))
}
