//! Pipeline persistence.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::entity::{Pipeline, PipelineKey};
use crate::error::{Error, Result};

#[async_trait]
pub trait PipelineRepository: Send + Sync {
    async fn get(&self, asset_id: &str, video_id: &str) -> Result<Option<Pipeline>>;

    /// Write the whole pipeline. An existing record keeps its `created_at`.
    async fn upsert(&self, pipeline: &Pipeline) -> Result<()>;
}

struct StoredPipeline {
    bytes: Vec<u8>,
    version: u64,
}

/// HashMap-backed repository. Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct InMemoryPipelineRepository {
    storage: Arc<RwLock<HashMap<PipelineKey, StoredPipeline>>>,
}

impl InMemoryPipelineRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes applied to a pipeline; zero when it was never stored.
    pub fn version(&self, asset_id: &str, video_id: &str) -> Result<u64> {
        let storage = self
            .storage
            .read()
            .map_err(|_| Error::LockPoisoned("pipeline read"))?;
        Ok(storage
            .get(&PipelineKey::new(asset_id, video_id))
            .map(|stored| stored.version)
            .unwrap_or(0))
    }

    /// Number of stored pipelines.
    pub fn len(&self) -> Result<usize> {
        let storage = self
            .storage
            .read()
            .map_err(|_| Error::LockPoisoned("pipeline read"))?;
        Ok(storage.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl PipelineRepository for InMemoryPipelineRepository {
    async fn get(&self, asset_id: &str, video_id: &str) -> Result<Option<Pipeline>> {
        let storage = self
            .storage
            .read()
            .map_err(|_| Error::LockPoisoned("pipeline read"))?;

        match storage.get(&PipelineKey::new(asset_id, video_id)) {
            Some(stored) => Ok(Some(serde_json::from_slice(&stored.bytes)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, pipeline: &Pipeline) -> Result<()> {
        let key = pipeline.key();
        let mut storage = self
            .storage
            .write()
            .map_err(|_| Error::LockPoisoned("pipeline write"))?;

        let (bytes, version) = match storage.get(&key) {
            Some(existing) => {
                let previous: Pipeline = serde_json::from_slice(&existing.bytes)?;
                let mut merged = pipeline.clone();
                merged.created_at = previous.created_at;
                (serde_json::to_vec(&merged)?, existing.version + 1)
            }
            None => (serde_json::to_vec(pipeline)?, 1),
        };

        storage.insert(key, StoredPipeline { bytes, version });
        Ok(())
    }
}
