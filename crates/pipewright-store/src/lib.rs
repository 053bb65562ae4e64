//! Pipewright Store
//!
//! This crate provides the storage trait for the live configuration. The only
//! write primitive is [`ConfigRepository::compare_and_swap`]: a new config is
//! committed only if the stored config still has the digest the caller read.
//!
//! Implementations:
//! - [`MemoryConfigRepository`] for tests and embedding
//! - [`FsConfigRepository`] backed by a single JSON file

mod fs;
mod memory;

pub use fs::FsConfigRepository;
pub use memory::MemoryConfigRepository;

use async_trait::async_trait;
use pipewright_config::CruiseConfig;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// The stored config together with its digest.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
  pub config: CruiseConfig,
  pub digest: String,
}

impl ConfigSnapshot {
  pub fn new(config: CruiseConfig) -> Result<Self, Error> {
    let digest = config.digest()?;
    Ok(Self { config, digest })
  }
}

/// Result of a compare-and-swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
  Committed { digest: String },
  Conflict { current_digest: String },
}

/// Storage for the live configuration.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
  /// Read the current config and its digest.
  async fn current(&self) -> Result<ConfigSnapshot, Error>;

  /// Replace the config if its digest is still `expected_digest`.
  async fn compare_and_swap(
    &self,
    config: CruiseConfig,
    expected_digest: &str,
  ) -> Result<SwapOutcome, Error>;
}
