use async_trait::async_trait;
use pipewright_config::CruiseConfig;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{ConfigRepository, ConfigSnapshot, Error, SwapOutcome};

/// In-memory config repository.
pub struct MemoryConfigRepository {
  state: Mutex<ConfigSnapshot>,
}

impl MemoryConfigRepository {
  pub fn new(config: CruiseConfig) -> Result<Self, Error> {
    Ok(Self {
      state: Mutex::new(ConfigSnapshot::new(config)?),
    })
  }
}

#[async_trait]
impl ConfigRepository for MemoryConfigRepository {
  async fn current(&self) -> Result<ConfigSnapshot, Error> {
    Ok(self.state.lock().await.clone())
  }

  async fn compare_and_swap(
    &self,
    config: CruiseConfig,
    expected_digest: &str,
  ) -> Result<SwapOutcome, Error> {
    let mut state = self.state.lock().await;
    if state.digest != expected_digest {
      debug!(expected = %expected_digest, current = %state.digest, "config digest mismatch");
      return Ok(SwapOutcome::Conflict {
        current_digest: state.digest.clone(),
      });
    }

    *state = ConfigSnapshot::new(config)?;
    Ok(SwapOutcome::Committed {
      digest: state.digest.clone(),
    })
  }
}
