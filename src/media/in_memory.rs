//! HashMap-backed media catalog for testing and development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::commands::{Asset, UpdateVideoMetadataCommand, UpsertVideoCommand, Video};
use super::service::MediaCommandService;
use super::types::VideoFormat;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VideoKey {
    asset_id: String,
    video_id: Option<String>,
    format: VideoFormat,
}

#[derive(Default)]
struct Catalog {
    assets: HashMap<String, Asset>,
    videos: HashMap<VideoKey, Video>,
}

/// Clone-friendly via Arc; clones share the same catalog.
#[derive(Clone, Default)]
pub struct InMemoryMediaCatalog {
    catalog: Arc<RwLock<Catalog>>,
    upserts: Arc<AtomicUsize>,
}

impl InMemoryMediaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `upsert_video` calls that succeeded.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn asset(&self, asset_id: &str) -> Result<Option<Asset>> {
        let catalog = self.read()?;
        Ok(catalog.assets.get(asset_id).cloned())
    }

    /// The video stored under an explicit video id.
    pub fn video(
        &self,
        asset_id: &str,
        video_id: &str,
        format: VideoFormat,
    ) -> Result<Option<Video>> {
        let catalog = self.read()?;
        Ok(catalog
            .videos
            .get(&VideoKey {
                asset_id: asset_id.to_string(),
                video_id: Some(video_id.to_string()),
                format,
            })
            .cloned())
    }

    /// Every video of an asset, ordered by format then id.
    pub fn videos(&self, asset_id: &str) -> Result<Vec<Video>> {
        let catalog = self.read()?;
        let mut videos: Vec<Video> = catalog
            .videos
            .values()
            .filter(|video| video.asset_id == asset_id)
            .cloned()
            .collect();
        videos.sort_by(|a, b| {
            a.format
                .as_str()
                .cmp(b.format.as_str())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(videos)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Catalog>> {
        self.catalog
            .read()
            .map_err(|_| Error::LockPoisoned("media catalog read"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Catalog>> {
        self.catalog
            .write()
            .map_err(|_| Error::LockPoisoned("media catalog write"))
    }
}

#[async_trait]
impl MediaCommandService for InMemoryMediaCatalog {
    async fn upsert_video(&self, cmd: UpsertVideoCommand) -> Result<(Asset, Video)> {
        if cmd.asset_id.trim().is_empty() {
            return Err(Error::validation("assetId is required"));
        }

        let now = Utc::now();
        let key = VideoKey {
            asset_id: cmd.asset_id.clone(),
            video_id: cmd.video_id.clone(),
            format: cmd.format,
        };

        let mut catalog = self.write()?;
        let asset = catalog
            .assets
            .entry(cmd.asset_id.clone())
            .and_modify(|asset| asset.updated_at = now)
            .or_insert_with(|| Asset {
                id: cmd.asset_id.clone(),
                created_at: now,
                updated_at: now,
            })
            .clone();

        let (id, created_at) = match catalog.videos.get(&key) {
            Some(existing) => (existing.id.clone(), existing.created_at),
            None => (
                cmd.video_id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                now,
            ),
        };

        let video = Video {
            id,
            asset_id: cmd.asset_id,
            format: cmd.format,
            label: cmd.label,
            storage: cmd.storage,
            content_type: cmd.content_type,
            status: cmd.status,
            metadata: cmd.metadata,
            segments: cmd.segments,
            stream: cmd.stream,
            created_at,
            updated_at: now,
        };
        catalog.videos.insert(key, video.clone());
        drop(catalog);

        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok((asset, video))
    }

    async fn update_video_metadata(&self, cmd: UpdateVideoMetadataCommand) -> Result<()> {
        let key = VideoKey {
            asset_id: cmd.asset_id.clone(),
            video_id: Some(cmd.video_id.clone()),
            format: VideoFormat::Raw,
        };

        let mut catalog = self.write()?;
        let video = catalog
            .videos
            .get_mut(&key)
            .ok_or_else(|| {
                Error::not_found("video", format!("{}/{}", cmd.asset_id, cmd.video_id))
            })?;

        video.metadata.width = cmd.width;
        video.metadata.height = cmd.height;
        video.metadata.duration = cmd.duration;
        video.metadata.bitrate = cmd.bitrate;
        video.metadata.codec = cmd.codec;
        video.metadata.size = cmd.size;
        if !cmd.content_type.is_empty() {
            video.content_type = cmd.content_type;
        }
        video.updated_at = Utc::now();
        Ok(())
    }
}
