use std::sync::Arc;

use super::entity::{Pipeline, StepTransition};
use super::store::PipelineRepository;
use crate::error::Result;

/// Get-or-create plus step transitions over a [`PipelineRepository`].
///
/// No in-process locking: two writers racing on the same pipeline resolve
/// last-write-wins at the store.
#[derive(Clone)]
pub struct PipelineService {
    repository: Arc<dyn PipelineRepository>,
}

impl PipelineService {
    pub fn new(repository: Arc<dyn PipelineRepository>) -> Self {
        Self { repository }
    }

    /// The stored pipeline, or `None` when nothing was recorded yet.
    pub async fn get(&self, asset_id: &str, video_id: &str) -> Result<Option<Pipeline>> {
        self.repository.get(asset_id, video_id).await
    }

    /// Load the pipeline, or a fresh unsaved one when none exists.
    pub async fn get_or_create(&self, asset_id: &str, video_id: &str) -> Result<Pipeline> {
        Ok(self
            .repository
            .get(asset_id, video_id)
            .await?
            .unwrap_or_else(|| Pipeline::new(asset_id, video_id)))
    }

    /// Start `step`, replacing whatever it held. Always written.
    pub async fn mark_requested(
        &self,
        asset_id: &str,
        video_id: &str,
        step: &str,
        job_id: Option<&str>,
        correlation_id: Option<&str>,
    ) -> Result<()> {
        let mut pipeline = self.get_or_create(asset_id, video_id).await?;
        pipeline.set_requested(
            step,
            job_id.map(str::to_string),
            correlation_id.map(str::to_string),
        );
        self.repository.upsert(&pipeline).await?;
        tracing::debug!(asset_id, video_id, step, "pipeline step requested");
        Ok(())
    }

    /// Complete `step`. A repeat of the same outcome skips the write.
    pub async fn mark_completed(&self, asset_id: &str, video_id: &str, step: &str) -> Result<()> {
        let mut pipeline = self.get_or_create(asset_id, video_id).await?;
        let transition = pipeline.set_completed(step);
        self.persist(&pipeline, step, transition).await
    }

    /// Fail `step` with `error_message`. A repeat of the same outcome skips the write.
    pub async fn mark_failed(
        &self,
        asset_id: &str,
        video_id: &str,
        step: &str,
        error_message: &str,
    ) -> Result<()> {
        let mut pipeline = self.get_or_create(asset_id, video_id).await?;
        let transition = pipeline.set_failed(step, error_message);
        self.persist(&pipeline, step, transition).await
    }

    async fn persist(
        &self,
        pipeline: &Pipeline,
        step: &str,
        transition: StepTransition,
    ) -> Result<()> {
        match transition {
            StepTransition::Unchanged => {
                tracing::debug!(
                    asset_id = %pipeline.asset_id,
                    video_id = %pipeline.video_id,
                    step,
                    "pipeline step already in requested outcome"
                );
                return Ok(());
            }
            StepTransition::Overwrote(previous) => {
                tracing::warn!(
                    asset_id = %pipeline.asset_id,
                    video_id = %pipeline.video_id,
                    step,
                    previous = %previous,
                    "overwriting terminal pipeline step"
                );
            }
            StepTransition::Applied => {}
        }
        self.repository.upsert(pipeline).await
    }
}
