//! The in-run artifact store.
//!
//! Built outputs are recorded here under their canonical name. Entries are
//! append-only for the lifetime of a run: a name is stored at most once and
//! nothing is evicted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, info};

use crate::output::{DirectoryHandle, FileHandle, Output, OutputKind};
use crate::util::fs::copy_path;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("artifact '{0}' has not been built")]
  NotFound(String),

  #[error("artifact '{0}' is already stored")]
  AlreadyStored(String),

  #[error("artifact '{name}' is a {found}, not a {expected}")]
  KindMismatch {
    name: String,
    expected: OutputKind,
    found: OutputKind,
  },

  #[error("failed to export '{name}' to {}: {source}", destination.display())]
  Export {
    name: String,
    destination: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Concurrency-safe map from canonical name to built output.
#[derive(Debug, Default)]
pub struct ArtifactStore {
  entries: RwLock<HashMap<String, Output>>,
}

impl ArtifactStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn store_file(&self, name: &str, file: FileHandle) -> Result<(), StoreError> {
    self.store(name, Output::File(file))
  }

  pub fn store_directory(&self, name: &str, directory: DirectoryHandle) -> Result<(), StoreError> {
    self.store(name, Output::Directory(directory))
  }

  pub fn store(&self, name: &str, output: Output) -> Result<(), StoreError> {
    let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
    if entries.contains_key(name) {
      return Err(StoreError::AlreadyStored(name.to_string()));
    }
    debug!(artifact = %name, kind = %output.kind(), path = ?output.path(), "storing output");
    entries.insert(name.to_string(), output);
    Ok(())
  }

  pub fn get(&self, name: &str) -> Result<Output, StoreError> {
    self
      .entries
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(name)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(name.to_string()))
  }

  pub fn file(&self, name: &str) -> Result<FileHandle, StoreError> {
    match self.get(name)? {
      Output::File(file) => Ok(file),
      other => Err(mismatch(name, OutputKind::File, &other)),
    }
  }

  pub fn directory(&self, name: &str) -> Result<DirectoryHandle, StoreError> {
    match self.get(name)? {
      Output::Directory(directory) => Ok(directory),
      other => Err(mismatch(name, OutputKind::Directory, &other)),
    }
  }

  pub fn exists(&self, name: &str) -> bool {
    self
      .entries
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .contains_key(name)
  }

  /// Copy the stored output to `destination_dir/<name>`.
  ///
  /// Directories are copied recursively. Returns the exported path.
  pub async fn export(&self, name: &str, destination_dir: &Path) -> Result<PathBuf, StoreError> {
    let output = self.get(name)?;
    let destination = destination_dir.join(name);

    copy_path(output.path().to_path_buf(), destination.clone())
      .await
      .map_err(|source| StoreError::Export {
        name: name.to_string(),
        destination: destination.clone(),
        source,
      })?;

    info!(artifact = %name, destination = %destination.display(), "exported artifact");
    Ok(destination)
  }

  /// Stored canonical names, sorted.
  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self
      .entries
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .keys()
      .cloned()
      .collect();
    names.sort();
    names
  }

  pub fn len(&self) -> usize {
    self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

fn mismatch(name: &str, expected: OutputKind, found: &Output) -> StoreError {
  StoreError::KindMismatch {
    name: name.to_string(),
    expected,
    found: found.kind(),
  }
}
