//! Memoized, single-flight argument resolution.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{BoxFuture, try_join_all};
use tracing::{debug, info};

use super::types::{Argument, ArgumentError, ArgumentValue};
use crate::config::RunOptions;
use crate::output::{DirectoryHandle, FileHandle};
use crate::util::singleflight::SingleFlight;

type Resolution = Result<ArgumentValue, ArgumentError>;

/// Resolves arguments for one run.
///
/// Every argument's resolver body runs at most once per resolver, no matter
/// how many tasks ask for it concurrently; failures are cached the same way as
/// values. Drop the resolver to discard everything at the end of the run.
pub struct ArgumentResolver {
  flight: SingleFlight<String, Resolution>,
  vars: BTreeMap<String, String>,
}

impl ArgumentResolver {
  pub fn new(options: &RunOptions) -> Arc<Self> {
    Arc::new(Self {
      flight: SingleFlight::new(),
      vars: options.vars.clone(),
    })
  }

  /// Resolve an argument, running its requirements first.
  pub async fn resolve(self: &Arc<Self>, argument: &Argument) -> Resolution {
    let this = Arc::clone(self);
    let owned = argument.clone();
    self
      .flight
      .get_or_run(argument.name.clone(), move || this.run(owned))
      .await
  }

  pub async fn string(self: &Arc<Self>, argument: &Argument) -> Result<String, ArgumentError> {
    self.resolve(argument).await?.into_string(&argument.name)
  }

  pub async fn int64(self: &Arc<Self>, argument: &Argument) -> Result<i64, ArgumentError> {
    self.resolve(argument).await?.into_int64(&argument.name)
  }

  pub async fn bool(self: &Arc<Self>, argument: &Argument) -> Result<bool, ArgumentError> {
    self.resolve(argument).await?.into_bool(&argument.name)
  }

  pub async fn directory(self: &Arc<Self>, argument: &Argument) -> Result<DirectoryHandle, ArgumentError> {
    self.resolve(argument).await?.into_directory(&argument.name)
  }

  pub async fn file(self: &Arc<Self>, argument: &Argument) -> Result<FileHandle, ArgumentError> {
    self.resolve(argument).await?.into_file(&argument.name)
  }

  /// The memoized result for `name`, if it has been resolved.
  pub fn cached(&self, name: &str) -> Option<Resolution> {
    self.flight.get(&name.to_string())
  }

  pub fn var(&self, key: &str) -> Option<&str> {
    self.vars.get(key).map(String::as_str)
  }

  fn run(self: Arc<Self>, argument: Argument) -> BoxFuture<'static, Resolution> {
    Box::pin(async move {
      debug!(argument = %argument.name, requires = argument.requires.len(), "resolving argument");

      let name = argument.name.as_str();
      let requirements = argument.requires.iter().map(|requirement| {
        let this = Arc::clone(&self);
        async move {
          this
            .resolve(requirement)
            .await
            .map_err(|source| ArgumentError::Requirement {
              argument: name.to_string(),
              requirement: requirement.name.clone(),
              source: Box::new(source),
            })
        }
      });
      try_join_all(requirements).await?;

      let ctx = ResolveCtx {
        resolver: Arc::clone(&self),
        argument: argument.name.clone(),
        requires: argument.all_requires().cloned().collect(),
        deferred: argument.deferred.iter().map(|a| a.name.clone()).collect(),
      };
      let value = (argument.resolver())(ctx).await?;

      if value.kind() != argument.kind {
        return Err(ArgumentError::TypeMismatch {
          argument: argument.name.clone(),
          expected: argument.kind,
          found: value.kind(),
        });
      }

      info!(argument = %argument.name, "argument resolved");
      Ok(value)
    })
  }
}

/// Context handed to an argument's resolver body.
#[derive(Clone)]
pub struct ResolveCtx {
  resolver: Arc<ArgumentResolver>,
  argument: String,
  requires: Vec<Argument>,
  deferred: Vec<String>,
}

impl ResolveCtx {
  /// Name of the argument being resolved.
  pub fn name(&self) -> &str {
    &self.argument
  }

  /// A raw configuration variable for this run.
  pub fn var(&self, key: &str) -> Option<&str> {
    self.resolver.var(key)
  }

  /// Value of a required argument. Reading an argument that is not listed in
  /// the requirements is an error. Deferred requirements resolve here, on
  /// first read.
  pub async fn value(&self, requirement: &Argument) -> Resolution {
    if !self.requires.iter().any(|r| r.name == requirement.name) {
      return Err(ArgumentError::Undeclared {
        argument: self.argument.clone(),
        requirement: requirement.name.clone(),
      });
    }
    let resolution = self.resolver.resolve(requirement).await;
    if self.deferred.contains(&requirement.name) {
      return resolution.map_err(|source| ArgumentError::Requirement {
        argument: self.argument.clone(),
        requirement: requirement.name.clone(),
        source: Box::new(source),
      });
    }
    resolution
  }

  pub async fn string(&self, requirement: &Argument) -> Result<String, ArgumentError> {
    self.value(requirement).await?.into_string(&requirement.name)
  }

  pub async fn directory(&self, requirement: &Argument) -> Result<DirectoryHandle, ArgumentError> {
    self.value(requirement).await?.into_directory(&requirement.name)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  use super::*;
  use crate::arguments::ArgumentKind;

  fn counted(name: &str, calls: Arc<AtomicUsize>, value: &str) -> Argument {
    let value = value.to_string();
    Argument::new(name, ArgumentKind::String, move |_ctx| {
      let calls = calls.clone();
      let value = value.clone();
      async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(ArgumentValue::String(value))
      }
    })
  }

  #[tokio::test]
  async fn resolves_once_and_memoizes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let arg = counted("build-id", calls.clone(), "42");
    let resolver = ArgumentResolver::new(&RunOptions::default());

    assert_eq!(resolver.string(&arg).await.unwrap(), "42");
    assert_eq!(resolver.string(&arg).await.unwrap(), "42");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(resolver.cached("build-id"), Some(Ok(ArgumentValue::String("42".to_string()))));
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn concurrent_first_callers_share_one_resolution() {
    let calls = Arc::new(AtomicUsize::new(0));
    let arg = counted("source-dir", calls.clone(), "/src/grafana");
    let resolver = ArgumentResolver::new(&RunOptions::default());

    let handles: Vec<_> = (0..10)
      .map(|_| {
        let resolver = resolver.clone();
        let arg = arg.clone();
        tokio::spawn(async move { resolver.resolve(&arg).await })
      })
      .collect();

    for handle in handles {
      assert_eq!(
        handle.await.unwrap(),
        Ok(ArgumentValue::String("/src/grafana".to_string()))
      );
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn composed_arguments_read_their_requirements() {
    let calls = Arc::new(AtomicUsize::new(0));
    let source = counted("source-dir", calls.clone(), "/src/grafana");
    let source_for_version = source.clone();
    let version = Argument::new("version", ArgumentKind::String, move |ctx| {
      let source = source_for_version.clone();
      async move {
        let dir = ctx.string(&source).await?;
        Ok(ArgumentValue::String(format!("{}@v1.2.3", dir)))
      }
    })
    .requires(vec![source.clone()]);

    let resolver = ArgumentResolver::new(&RunOptions::default());
    assert_eq!(resolver.string(&version).await.unwrap(), "/src/grafana@v1.2.3");
    assert_eq!(resolver.string(&source).await.unwrap(), "/src/grafana");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn deferred_requirements_resolve_only_when_read() {
    let calls = Arc::new(AtomicUsize::new(0));
    let source = counted("source-dir", calls.clone(), "/src/grafana");
    let source_for_version = source.clone();
    let version = Argument::new("version", ArgumentKind::String, move |ctx| {
      let source = source_for_version.clone();
      async move {
        if let Some(version) = ctx.var("version") {
          return Ok(ArgumentValue::String(version.to_string()));
        }
        let dir = ctx.string(&source).await?;
        Ok(ArgumentValue::String(format!("{}@v0.0.0", dir)))
      }
    })
    .requires_lazily(vec![source.clone()]);

    let pinned = ArgumentResolver::new(&RunOptions::default().with_var("version", "v9.0.0"));
    assert_eq!(pinned.string(&version).await.unwrap(), "v9.0.0");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let fallback = ArgumentResolver::new(&RunOptions::default());
    assert_eq!(fallback.string(&version).await.unwrap(), "/src/grafana@v0.0.0");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn reading_an_undeclared_argument_fails() {
    let other = counted("other", Arc::new(AtomicUsize::new(0)), "x");
    let sneaky = Argument::new("sneaky", ArgumentKind::String, move |ctx| {
      let other = other.clone();
      async move { ctx.value(&other).await }
    });

    let resolver = ArgumentResolver::new(&RunOptions::default());
    let err = resolver.resolve(&sneaky).await.unwrap_err();
    assert_eq!(
      err,
      ArgumentError::Undeclared {
        argument: "sneaky".to_string(),
        requirement: "other".to_string(),
      }
    );
  }

  #[tokio::test]
  async fn declared_kind_is_enforced() {
    let liar = Argument::new("is-release", ArgumentKind::Bool, |_ctx| async {
      Ok(ArgumentValue::String("yes".to_string()))
    });
    let resolver = ArgumentResolver::new(&RunOptions::default());

    let err = resolver.bool(&liar).await.unwrap_err();
    assert!(matches!(
      err,
      ArgumentError::TypeMismatch {
        expected: ArgumentKind::Bool,
        found: ArgumentKind::String,
        ..
      }
    ));
  }

  #[tokio::test]
  async fn typed_accessor_rejects_other_kinds() {
    let flag = Argument::new("is-release", ArgumentKind::Bool, |_ctx| async { Ok(ArgumentValue::Bool(true)) });
    let resolver = ArgumentResolver::new(&RunOptions::default());

    assert!(resolver.bool(&flag).await.unwrap());
    assert!(matches!(
      resolver.string(&flag).await,
      Err(ArgumentError::TypeMismatch { .. })
    ));
  }

  #[tokio::test]
  async fn requirement_failures_propagate_and_are_memoized() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_body = calls.clone();
    let broken = Argument::new("enterprise-dir", ArgumentKind::Directory, move |ctx| {
      let calls = calls_in_body.clone();
      async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(ArgumentError::failed(ctx.name(), "enterprise_dir is not set"))
      }
    });
    let dependent = Argument::new("enterprise-version", ArgumentKind::String, |_ctx| async {
      Ok(ArgumentValue::String("unreachable".to_string()))
    })
    .requires(vec![broken.clone()]);

    let resolver = ArgumentResolver::new(&RunOptions::default());
    let first = resolver.resolve(&dependent).await.unwrap_err();
    let second = resolver.resolve(&dependent).await.unwrap_err();

    assert_eq!(first, second);
    assert!(matches!(first, ArgumentError::Requirement { ref requirement, .. } if requirement == "enterprise-dir"));
    assert!(resolver.directory(&broken).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn resolver_bodies_see_run_vars() {
    let arg = Argument::new("build-id", ArgumentKind::String, |ctx| async move {
      let id = ctx.var("build_id").unwrap_or("local").to_string();
      Ok(ArgumentValue::String(id))
    });
    let resolver = ArgumentResolver::new(&RunOptions::default().with_var("build_id", "777"));
    assert_eq!(resolver.string(&arg).await.unwrap(), "777");
  }
}
