// src/hardware/store.rs - JSON-file backed gains store
use std::path::PathBuf;

use async_trait::async_trait;

use super::{ConfigStore, StoreError, StoredGains};

/// Stores auto-tuned gains as a small pretty-printed JSON file next to the
/// main configuration. A missing file simply means no stored layer yet.
#[derive(Debug, Clone)]
pub struct JsonGainsStore {
    path: PathBuf,
}

impl JsonGainsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl ConfigStore for JsonGainsStore {
    async fn read_gains(&self) -> Result<Option<StoredGains>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let gains: StoredGains = serde_json::from_str(&contents)?;
                Ok(Some(gains))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_gains(&self, kp: f64, ki: f64, kd: f64) -> Result<(), StoreError> {
        let gains = StoredGains { kp, ki, kd };
        let contents = serde_json::to_string_pretty(&gains)?;
        tokio::fs::write(&self.path, contents).await?;
        tracing::info!(
            "Persisted tuned gains to {}: kp={:.4}, ki={:.4}, kd={:.4}",
            self.path.display(),
            kp,
            ki,
            kd
        );
        Ok(())
    }
}
