//! Publish backends, selected by destination URI scheme.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::types::{PublishError, PublishJob, PublishedArtifact};
use crate::consts::CHECKSUM_SUFFIX;
use crate::output::Output;
use crate::util::fs::copy_path;
use crate::util::hash::{checksum_line, hash_bytes, hash_file};

/// Transfers one job's output to its destination.
#[async_trait]
pub trait PublishBackend: Send + Sync {
  async fn publish(&self, job: &PublishJob) -> Result<PublishedArtifact, PublishError>;
}

/// Pick the backend for a destination URI.
///
/// `file://` URIs and bare paths publish to the local filesystem,
/// `http://` and `https://` URIs upload with HTTP PUT.
pub fn backend_for(destination: &str) -> Result<Arc<dyn PublishBackend>, PublishError> {
  if destination.starts_with("http://") || destination.starts_with("https://") {
    return Ok(Arc::new(HttpBackend::new(destination)));
  }
  if let Some(path) = destination.strip_prefix("file://") {
    return Ok(Arc::new(LocalBackend::new(path)));
  }
  if destination.contains("://") || destination.is_empty() {
    return Err(PublishError::UnsupportedScheme {
      destination: destination.to_string(),
    });
  }
  Ok(Arc::new(LocalBackend::new(destination)))
}

/// Copies outputs into a local directory.
///
/// Files are written through a temporary file in the destination and renamed
/// into place, then get a `<name>.sha256` sidecar.
#[derive(Debug, Clone)]
pub struct LocalBackend {
  root: PathBuf,
}

impl LocalBackend {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }
}

#[async_trait]
impl PublishBackend for LocalBackend {
  async fn publish(&self, job: &PublishJob) -> Result<PublishedArtifact, PublishError> {
    let target = self.root.join(&job.name);
    let io_error = |source| PublishError::Io {
      name: job.name.clone(),
      location: target.display().to_string(),
      source,
    };

    tokio::fs::create_dir_all(&self.root).await.map_err(io_error)?;

    let checksum = match &job.output {
      Output::Directory(dir) => {
        copy_path(dir.0.clone(), target.clone()).await.map_err(io_error)?;
        None
      }
      Output::File(file) => {
        let hash = hash_file(&file.0).await.map_err(io_error)?;
        let sidecar = format!("{}.{}", job.name, CHECKSUM_SUFFIX);
        let line = checksum_line(&hash, &job.name);

        let (source, root, name) = (file.0.clone(), self.root.clone(), job.name.clone());
        tokio::task::spawn_blocking(move || -> io::Result<()> {
          write_atomic(&root, &name, |out| {
            let mut input = std::fs::File::open(&source)?;
            io::copy(&mut input, out).map(|_| ())
          })?;
          write_atomic(&root, &sidecar, |out| out.write_all(line.as_bytes()))
        })
        .await
        .map_err(|e| io_error(io::Error::other(e)))?
        .map_err(io_error)?;

        Some(hash.0)
      }
    };

    info!(artifact = %job.name, location = %target.display(), "published artifact");
    Ok(PublishedArtifact {
      name: job.name.clone(),
      location: target.display().to_string(),
      checksum,
    })
  }
}

fn write_atomic(dir: &Path, name: &str, fill: impl FnOnce(&mut std::fs::File) -> io::Result<()>) -> io::Result<()> {
  let mut temp = NamedTempFile::new_in(dir)?;
  fill(temp.as_file_mut())?;
  temp.as_file_mut().sync_all()?;
  temp.persist(dir.join(name)).map_err(|e| e.error)?;
  Ok(())
}

/// Uploads outputs with HTTP PUT under a base URL.
///
/// A file is uploaded to `<base>/<name>` with its checksum at
/// `<base>/<name>.sha256`; a directory becomes one upload per file under
/// `<base>/<name>/`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
  base: String,
  client: reqwest::Client,
}

impl HttpBackend {
  pub fn new(base: &str) -> Self {
    Self {
      base: base.trim_end_matches('/').to_string(),
      client: reqwest::Client::new(),
    }
  }

  async fn put(&self, url: &str, body: Vec<u8>) -> Result<(), PublishError> {
    debug!(url = %url, bytes = body.len(), "uploading");
    let response = self
      .client
      .put(url)
      .body(body)
      .send()
      .await
      .map_err(|e| PublishError::Http {
        url: url.to_string(),
        message: e.to_string(),
      })?;

    if !response.status().is_success() {
      return Err(PublishError::Status {
        url: url.to_string(),
        status: response.status().as_u16(),
      });
    }
    Ok(())
  }
}

#[async_trait]
impl PublishBackend for HttpBackend {
  async fn publish(&self, job: &PublishJob) -> Result<PublishedArtifact, PublishError> {
    let url = format!("{}/{}", self.base, job.name);
    let read = |path: &Path, source| PublishError::Io {
      name: job.name.clone(),
      location: path.display().to_string(),
      source,
    };

    let checksum = match &job.output {
      Output::File(file) => {
        let body = tokio::fs::read(&file.0).await.map_err(|e| read(&file.0, e))?;
        let hash = hash_bytes(&body);
        self.put(&url, body).await?;
        let sidecar = checksum_line(&hash, &job.name).into_bytes();
        self.put(&format!("{}.{}", url, CHECKSUM_SUFFIX), sidecar).await?;
        Some(hash.0)
      }
      Output::Directory(dir) => {
        for entry in WalkDir::new(&dir.0).follow_links(true) {
          let entry = entry.map_err(|e| read(&dir.0, io::Error::other(e)))?;
          if !entry.file_type().is_file() {
            continue;
          }
          let relative = entry
            .path()
            .strip_prefix(&dir.0)
            .map_err(|e| read(entry.path(), io::Error::other(e)))?;
          let segments: Vec<_> = relative.components().map(|c| c.as_os_str().to_string_lossy()).collect();
          let body = tokio::fs::read(entry.path()).await.map_err(|e| read(entry.path(), e))?;
          self.put(&format!("{}/{}", url, segments.join("/")), body).await?;
        }
        None
      }
    };

    info!(artifact = %job.name, location = %url, "published artifact");
    Ok(PublishedArtifact {
      name: job.name.clone(),
      location: url,
      checksum,
    })
  }
}
