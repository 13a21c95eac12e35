//! Filesystem helpers for staging and exporting outputs.

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Recursively copy `src` into `dst`, creating `dst` if needed.
///
/// Symlinks are copied as the files they point to. Returns the number of
/// files copied.
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<u64> {
  let mut copied = 0;
  std::fs::create_dir_all(dst)?;

  for entry in WalkDir::new(src).follow_links(true) {
    let entry = entry.map_err(io::Error::other)?;
    let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    let target = dst.join(relative);

    if entry.file_type().is_dir() {
      std::fs::create_dir_all(&target)?;
    } else {
      if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
      }
      std::fs::copy(entry.path(), &target)?;
      copied += 1;
    }
  }

  Ok(copied)
}

/// Copy a file or a directory tree to `dst` without blocking the runtime.
pub async fn copy_path(src: PathBuf, dst: PathBuf) -> io::Result<()> {
  tokio::task::spawn_blocking(move || {
    if src.is_dir() {
      copy_dir_all(&src, &dst).map(|_| ())
    } else {
      if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
      }
      std::fs::copy(&src, &dst).map(|_| ())
    }
  })
  .await
  .map_err(io::Error::other)?
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn copies_nested_tree() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("src");
    std::fs::create_dir_all(src.join("bin/nested")).unwrap();
    std::fs::write(src.join("README"), "readme").unwrap();
    std::fs::write(src.join("bin/nested/tool"), "tool").unwrap();

    let dst = temp.path().join("dst");
    let copied = copy_dir_all(&src, &dst).unwrap();

    assert_eq!(copied, 2);
    assert_eq!(std::fs::read_to_string(dst.join("bin/nested/tool")).unwrap(), "tool");
  }

  #[tokio::test]
  async fn copy_path_handles_single_files() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("a.txt");
    std::fs::write(&src, "a").unwrap();

    let dst = temp.path().join("out/deeper/a.txt");
    copy_path(src, dst.clone()).await.unwrap();

    assert_eq!(std::fs::read_to_string(dst).unwrap(), "a");
  }
}
