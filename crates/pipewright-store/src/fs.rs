use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs4::fs_std::FileExt;
use pipewright_config::CruiseConfig;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{ConfigRepository, ConfigSnapshot, Error, SwapOutcome};

/// Config repository backed by a JSON file.
///
/// A missing file reads as the default (empty) config. A swap holds an
/// exclusive lock on `{path}.lock` from the digest check until the new file
/// is in place, so repositories in other processes over the same path are
/// serialized too. The new config is written to a uniquely named temp file
/// in the same directory and renamed over the old one.
pub struct FsConfigRepository {
  path: PathBuf,
  write_lock: Mutex<()>,
}

impl FsConfigRepository {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      write_lock: Mutex::new(()),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn dir(&self) -> PathBuf {
    match self.path.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
      _ => PathBuf::from("."),
    }
  }

  fn lock_path(&self) -> PathBuf {
    let mut lock = self.path.clone().into_os_string();
    lock.push(".lock");
    PathBuf::from(lock)
  }

  /// Block (off the runtime) until this process holds the file lock.
  /// The lock is released when the returned handle is dropped.
  async fn lock_file(&self) -> Result<File, Error> {
    let dir = self.dir();
    let lock_path = self.lock_path();
    let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
      std::fs::create_dir_all(&dir)?;
      let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;
      FileExt::lock_exclusive(&file)?;
      Ok(file)
    })
    .await
    .map_err(std::io::Error::other)??;
    Ok(file)
  }

  async fn read(&self) -> Result<ConfigSnapshot, Error> {
    let config = match tokio::fs::read(&self.path).await {
      Ok(bytes) => serde_json::from_slice(&bytes)?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(path = %self.path.display(), "config file missing, using default");
        CruiseConfig::default()
      }
      Err(e) => return Err(e.into()),
    };
    ConfigSnapshot::new(config)
  }

  async fn write(&self, config: &CruiseConfig) -> Result<(), Error> {
    let json = serde_json::to_vec_pretty(config)?;
    let dir = self.dir();
    let path = self.path.clone();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
      let mut tmp = NamedTempFile::new_in(&dir)?;
      tmp.write_all(&json)?;
      tmp.as_file().sync_all()?;
      tmp.persist(&path)?;
      Ok(())
    })
    .await
    .map_err(std::io::Error::other)??;
    Ok(())
  }
}

#[async_trait]
impl ConfigRepository for FsConfigRepository {
  async fn current(&self) -> Result<ConfigSnapshot, Error> {
    self.read().await
  }

  async fn compare_and_swap(
    &self,
    config: CruiseConfig,
    expected_digest: &str,
  ) -> Result<SwapOutcome, Error> {
    let _guard = self.write_lock.lock().await;
    let _file_lock = self.lock_file().await?;

    let current = self.read().await?;
    if current.digest != expected_digest {
      debug!(expected = %expected_digest, current = %current.digest, "config digest mismatch");
      return Ok(SwapOutcome::Conflict {
        current_digest: current.digest,
      });
    }

    let next = ConfigSnapshot::new(config)?;
    self.write(&next.config).await?;
    info!(path = %self.path.display(), digest = %next.digest, "config saved");
    Ok(SwapOutcome::Committed {
      digest: next.digest,
    })
  }
}
