//! State Store - Atomic JSON Snapshots of the Memory Store
//!
//! Saves `StoreState` snapshots to `state.json` using atomic writes
//! (write to tmp file, then rename). The file is always either the old or
//! the new version, never a partial write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, instrument};

use super::memory::StoreState;

/// Atomic JSON snapshot store for restart recovery.
pub struct StateStore {
    /// Path to state.json.
    state_path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
}

impl StateStore {
    /// Create a new state store in the given data directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub async fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;

        Ok(Self {
            state_path: dir.join("state.json"),
            tmp_path: dir.join("state.json.tmp"),
        })
    }

    /// Save a snapshot atomically (tmp → rename).
    #[instrument(skip(self, state))]
    pub async fn save(&self, state: &StoreState) -> Result<()> {
        let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;

        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp state file")?;

        fs::rename(&self.tmp_path, &self.state_path)
            .await
            .context("Failed to rename state file")?;

        info!(
            path = %self.state_path.display(),
            cycles = state.cycles.len(),
            orders = state.orders.len(),
            "State snapshot saved"
        );

        Ok(())
    }

    /// Load the most recent snapshot.
    ///
    /// Returns `None` if no state file exists (first startup).
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Option<StoreState>> {
        if !fs::try_exists(&self.state_path).await.unwrap_or(false) {
            info!("No state file found, starting fresh");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.state_path)
            .await
            .context("Failed to read state file")?;

        let state: StoreState =
            serde_json::from_str(&json).context("Failed to parse state JSON")?;

        info!(
            cycles = state.cycles.len(),
            baskets = state.baskets.len(),
            offers = state.offers.len(),
            orders = state.orders.len(),
            "State snapshot loaded"
        );

        Ok(Some(state))
    }

    /// Check if the state file is absent (first run) or readable.
    pub async fn is_healthy(&self) -> bool {
        match fs::try_exists(&self.state_path).await {
            Ok(false) => true,
            Ok(true) => fs::metadata(&self.state_path).await.is_ok(),
            Err(_) => false,
        }
    }
}
