//! Handles to built outputs.
//!
//! The engine never looks inside outputs; it only passes these handles between
//! the build executor, the store and the publish backends.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHandle(pub PathBuf);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryHandle(pub PathBuf);

/// Whether an artifact (or a build capture) produces a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
  File,
  Directory,
}

impl fmt::Display for OutputKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::File => write!(f, "file"),
      Self::Directory => write!(f, "directory"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum Output {
  File(FileHandle),
  Directory(DirectoryHandle),
}

impl Output {
  pub fn file(path: impl Into<PathBuf>) -> Self {
    Self::File(FileHandle(path.into()))
  }

  pub fn directory(path: impl Into<PathBuf>) -> Self {
    Self::Directory(DirectoryHandle(path.into()))
  }

  pub fn kind(&self) -> OutputKind {
    match self {
      Self::File(_) => OutputKind::File,
      Self::Directory(_) => OutputKind::Directory,
    }
  }

  pub fn path(&self) -> &Path {
    match self {
      Self::File(FileHandle(p)) | Self::Directory(DirectoryHandle(p)) => p,
    }
  }
}
