use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{StorageLocation, VideoFormat, VideoStatus};
use crate::event::JobCompletion;

/// Probe results for a media file. Zero or empty means unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalMetadata {
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    pub bitrate: u64,
    pub codec: String,
    pub size: u64,
    pub video_codec: String,
    pub audio_codec: String,
    pub frame_rate: String,
    pub audio_channels: u32,
    pub audio_sample_rate: u32,
}

impl From<&JobCompletion> for TechnicalMetadata {
    fn from(completion: &JobCompletion) -> Self {
        Self {
            width: completion.width,
            height: completion.height,
            duration: completion.duration,
            bitrate: completion.bitrate,
            codec: completion.codec.clone(),
            size: completion.size,
            video_codec: completion.video_codec.clone(),
            audio_codec: completion.audio_codec.clone(),
            frame_rate: completion.frame_rate.clone(),
            audio_channels: completion.audio_channels,
            audio_sample_rate: completion.audio_sample_rate,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentInfo {
    pub segment_count: u32,
    pub avg_segment_duration: f64,
    pub segments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    pub cdn_prefix: String,
    pub play_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One stored rendition of an asset's video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub asset_id: String,
    pub format: VideoFormat,
    pub label: String,
    pub storage: StorageLocation,
    pub content_type: String,
    pub status: VideoStatus,
    pub metadata: TechnicalMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<SegmentInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create or replace the video identified by its natural key: asset, video
/// and format, or asset and format when `video_id` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertVideoCommand {
    pub asset_id: String,
    pub video_id: Option<String>,
    pub format: VideoFormat,
    pub label: String,
    pub storage: StorageLocation,
    pub content_type: String,
    pub status: VideoStatus,
    pub metadata: TechnicalMetadata,
    pub segments: Option<SegmentInfo>,
    pub stream: Option<StreamInfo>,
}

impl UpsertVideoCommand {
    /// Upsert keyed by `(asset_id, video_id, format)`. Without a video id the catalog mints one.
    pub fn new(
        asset_id: impl Into<String>,
        video_id: Option<String>,
        format: VideoFormat,
        status: VideoStatus,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            video_id,
            format,
            label: String::new(),
            storage: StorageLocation::default(),
            content_type: String::new(),
            status,
            metadata: TechnicalMetadata::default(),
            segments: None,
            stream: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_storage(mut self, storage: StorageLocation) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_metadata(mut self, metadata: TechnicalMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_segments(mut self, segments: SegmentInfo) -> Self {
        self.segments = Some(segments);
        self
    }

    pub fn with_stream(mut self, stream: StreamInfo) -> Self {
        self.stream = Some(stream);
        self
    }
}

/// Overwrite the probe results of an asset's raw video.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateVideoMetadataCommand {
    pub asset_id: String,
    pub video_id: String,
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    pub bitrate: u64,
    pub codec: String,
    pub size: u64,
    pub content_type: String,
}

impl From<&JobCompletion> for UpdateVideoMetadataCommand {
    fn from(completion: &JobCompletion) -> Self {
        Self {
            asset_id: completion.asset_id.clone(),
            video_id: completion.video_id.clone(),
            width: completion.width,
            height: completion.height,
            duration: completion.duration,
            bitrate: completion.bitrate,
            codec: completion.codec.clone(),
            size: completion.size,
            content_type: completion.content_type.clone(),
        }
    }
}
