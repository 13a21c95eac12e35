use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

use super::resolver::ResolveCtx;
use crate::output::{DirectoryHandle, FileHandle};

/// The declared type of an [`Argument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentKind {
  String,
  Int64,
  Bool,
  Directory,
  File,
}

impl fmt::Display for ArgumentKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::String => "string",
      Self::Int64 => "int64",
      Self::Bool => "bool",
      Self::Directory => "directory",
      Self::File => "file",
    };
    write!(f, "{}", s)
  }
}

/// A resolved argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentValue {
  String(String),
  Int64(i64),
  Bool(bool),
  Directory(DirectoryHandle),
  File(FileHandle),
}

impl ArgumentValue {
  pub fn kind(&self) -> ArgumentKind {
    match self {
      Self::String(_) => ArgumentKind::String,
      Self::Int64(_) => ArgumentKind::Int64,
      Self::Bool(_) => ArgumentKind::Bool,
      Self::Directory(_) => ArgumentKind::Directory,
      Self::File(_) => ArgumentKind::File,
    }
  }

  pub fn into_string(self, argument: &str) -> Result<String, ArgumentError> {
    match self {
      Self::String(s) => Ok(s),
      other => Err(mismatch(argument, ArgumentKind::String, &other)),
    }
  }

  pub fn into_int64(self, argument: &str) -> Result<i64, ArgumentError> {
    match self {
      Self::Int64(n) => Ok(n),
      other => Err(mismatch(argument, ArgumentKind::Int64, &other)),
    }
  }

  pub fn into_bool(self, argument: &str) -> Result<bool, ArgumentError> {
    match self {
      Self::Bool(b) => Ok(b),
      other => Err(mismatch(argument, ArgumentKind::Bool, &other)),
    }
  }

  pub fn into_directory(self, argument: &str) -> Result<DirectoryHandle, ArgumentError> {
    match self {
      Self::Directory(d) => Ok(d),
      other => Err(mismatch(argument, ArgumentKind::Directory, &other)),
    }
  }

  pub fn into_file(self, argument: &str) -> Result<FileHandle, ArgumentError> {
    match self {
      Self::File(f) => Ok(f),
      other => Err(mismatch(argument, ArgumentKind::File, &other)),
    }
  }
}

fn mismatch(argument: &str, expected: ArgumentKind, found: &ArgumentValue) -> ArgumentError {
  ArgumentError::TypeMismatch {
    argument: argument.to_string(),
    expected,
    found: found.kind(),
  }
}

/// Errors resolving arguments.
///
/// Cloneable because a memoized failure is handed to every caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
  /// The resolver body failed.
  #[error("argument '{argument}' failed to resolve: {message}")]
  Failed { argument: String, message: String },

  /// The value's runtime type does not match what was asked for.
  #[error("argument '{argument}' is a {found}, expected {expected}")]
  TypeMismatch {
    argument: String,
    expected: ArgumentKind,
    found: ArgumentKind,
  },

  /// A resolver read an argument it did not list in its requirements.
  #[error("argument '{argument}' reads '{requirement}' without requiring it")]
  Undeclared { argument: String, requirement: String },

  /// A required argument failed.
  #[error("argument '{argument}' requires '{requirement}': {source}")]
  Requirement {
    argument: String,
    requirement: String,
    #[source]
    source: Box<ArgumentError>,
  },
}

impl ArgumentError {
  pub fn failed(argument: &str, message: impl fmt::Display) -> Self {
    Self::Failed {
      argument: argument.to_string(),
      message: message.to_string(),
    }
  }
}

pub type ResolverFn = Arc<dyn Fn(ResolveCtx) -> BoxFuture<'static, Result<ArgumentValue, ArgumentError>> + Send + Sync>;

/// A lazily resolved external input.
///
/// The name is the argument's identity: within one run the resolver body runs
/// at most once per name.
#[derive(Clone)]
pub struct Argument {
  pub name: String,
  pub kind: ArgumentKind,
  pub requires: Vec<Argument>,
  /// Requirements resolved only if the body reads them.
  pub deferred: Vec<Argument>,
  resolver: ResolverFn,
}

impl Argument {
  pub fn new<F, Fut>(name: &str, kind: ArgumentKind, resolver: F) -> Self
  where
    F: Fn(ResolveCtx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ArgumentValue, ArgumentError>> + Send + 'static,
  {
    Self {
      name: name.to_string(),
      kind,
      requires: Vec::new(),
      deferred: Vec::new(),
      resolver: Arc::new(move |ctx| Box::pin(resolver(ctx))),
    }
  }

  pub fn requires(mut self, requires: Vec<Argument>) -> Self {
    self.requires = requires;
    self
  }

  pub fn requires_lazily(mut self, deferred: Vec<Argument>) -> Self {
    self.deferred = deferred;
    self
  }

  /// Every requirement, eager ones first.
  pub fn all_requires(&self) -> impl Iterator<Item = &Argument> {
    self.requires.iter().chain(self.deferred.iter())
  }

  pub(crate) fn resolver(&self) -> &ResolverFn {
    &self.resolver
  }

  /// True if both are the same declaration (same name and resolver body).
  pub fn same(&self, other: &Argument) -> bool {
    self.name == other.name && Arc::ptr_eq(&self.resolver, &other.resolver)
  }
}

impl fmt::Debug for Argument {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Argument")
      .field("name", &self.name)
      .field("kind", &self.kind)
      .field("requires", &self.requires.iter().map(|a| &a.name).collect::<Vec<_>>())
      .field("deferred", &self.deferred.iter().map(|a| &a.name).collect::<Vec<_>>())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn typed_accessors_report_mismatch() {
    let err = ArgumentValue::Bool(true).into_string("version").unwrap_err();
    assert_eq!(
      err,
      ArgumentError::TypeMismatch {
        argument: "version".to_string(),
        expected: ArgumentKind::String,
        found: ArgumentKind::Bool,
      }
    );
    assert_eq!(ArgumentValue::Int64(3).into_int64("n").unwrap(), 3);
  }

  #[test]
  fn requirement_error_names_the_chain() {
    let err = ArgumentError::Requirement {
      argument: "version".to_string(),
      requirement: "source-dir".to_string(),
      source: Box::new(ArgumentError::failed("source-dir", "no such directory")),
    };
    assert_eq!(
      err.to_string(),
      "argument 'version' requires 'source-dir': argument 'source-dir' failed to resolve: no such directory"
    );
  }
}
