mod state;

use std::{path::Path, sync::Arc};

use state::StoreState;
use tracing::{debug, info};

use super::plate::Plate;
use crate::error::StoreError;

/// Key under which the plate list is kept as one JSON document
pub const PLATES_KEY: &str = "plates";

pub trait PlateRepository {
    /// Replace the stored plate list
    async fn save_plates(&self, plates: &[Plate]) -> Result<(), StoreError>;

    /// Stored plates, or an empty list when nothing was saved yet
    async fn load_plates(&self) -> Result<Vec<Plate>, StoreError>;

    /// Add plates after the ones already stored
    async fn append_plates(&self, plates: &[Plate]) -> Result<usize, StoreError>;
}

/// Plates persisted in a single-file SQLite key-value table
#[derive(Debug, Clone)]
pub struct PlateStore {
    state: Arc<StoreState>,
}

impl PlateStore {
    /// Open or create the store. The parent directory must exist.
    pub async fn open<P: AsRef<Path>>(db_file: P) -> Result<Self, StoreError> {
        let state = StoreState::new(&db_file).await?;
        info!(path = %db_file.as_ref().display(), "Plate store opened");
        Ok(Self {
            state: Arc::new(state),
        })
    }

    /// Flush the write-ahead log and close the pool.
    /// Call this before dropping in an async context (e.g. tests with #[tokio::test]).
    pub async fn close(&self) -> Result<(), StoreError> {
        self.state.close().await
    }
}

impl PlateRepository for PlateStore {
    async fn save_plates(&self, plates: &[Plate]) -> Result<(), StoreError> {
        let json = serde_json::to_string(plates)?;
        self.state.set(PLATES_KEY, &json).await?;
        debug!(count = plates.len(), "Plates saved");
        Ok(())
    }

    async fn load_plates(&self) -> Result<Vec<Plate>, StoreError> {
        decode_plates(self.state.get(PLATES_KEY).await?)
    }

    async fn append_plates(&self, plates: &[Plate]) -> Result<usize, StoreError> {
        let total = self
            .state
            .update(PLATES_KEY, |current| {
                let mut stored = decode_plates(current)?;
                stored.extend_from_slice(plates);
                Ok((serde_json::to_string(&stored)?, stored.len()))
            })
            .await?;
        debug!(added = plates.len(), total, "Plates appended");
        Ok(total)
    }
}

/// Missing or blank values mean no plates were saved yet
fn decode_plates(value: Option<String>) -> Result<Vec<Plate>, StoreError> {
    match value {
        Some(json) if !json.trim().is_empty() => Ok(serde_json::from_str(&json)?),
        _ => Ok(Vec::new()),
    }
}
