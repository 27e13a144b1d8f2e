//! Collaborators owned by other parts of the system.

use async_trait::async_trait;

use super::commands::{Asset, UpdateVideoMetadataCommand, UpsertVideoCommand, Video};
use crate::error::Result;

/// Write side of the media catalog.
#[async_trait]
pub trait MediaCommandService: Send + Sync {
    /// Create or replace a video by natural key, creating its asset if needed.
    async fn upsert_video(&self, cmd: UpsertVideoCommand) -> Result<(Asset, Video)>;

    /// Fails with `NotFound` when the raw video does not exist.
    async fn update_video_metadata(&self, cmd: UpdateVideoMetadataCommand) -> Result<()>;
}
