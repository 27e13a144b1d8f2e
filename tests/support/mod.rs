//! Shared fixtures for the integration tests.
//!
//! Every collaborator is in memory. The broker is shared between the inbound
//! side (tests publish worker events onto it) and the outbound side (handlers
//! and the dispatcher publish onto it), which is how a single-broker
//! deployment looks.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use media_pipeline::broker::EventProducer;
use media_pipeline::event::{event_types, JobCompletion, UploadNotified};
use media_pipeline::media::{InMemoryMediaCatalog, PrefixCdn};
use media_pipeline::outbox::{InMemoryOutboxStore, OutboxPublisher};
use media_pipeline::pipeline::{InMemoryPipelineRepository, PipelineService};
use media_pipeline::{Event, EventHandlers, InMemoryBroker};

pub const CDN_PREFIX: &str = "https://cdn.example.com/media";
pub const SOURCE: &str = "media-pipeline-test";

pub struct Fixture {
    pub broker: InMemoryBroker,
    pub media: InMemoryMediaCatalog,
    pub pipelines: InMemoryPipelineRepository,
    pub outbox: InMemoryOutboxStore,
    pub handlers: EventHandlers,
}

impl Fixture {
    /// Handlers that publish straight to the broker.
    pub fn direct() -> Self {
        Self::build(false)
    }

    /// Handlers that publish into the outbox store.
    pub fn with_outbox() -> Self {
        Self::build(true)
    }

    fn build(outbox_enabled: bool) -> Self {
        let broker = InMemoryBroker::new(2);
        let media = InMemoryMediaCatalog::new();
        let pipelines = InMemoryPipelineRepository::new();
        let outbox = InMemoryOutboxStore::new();

        let mut publisher = OutboxPublisher::direct(self::producer(&broker));
        if outbox_enabled {
            publisher = publisher.with_store(Arc::new(outbox.clone()));
        }
        let handlers = EventHandlers::new(
            Arc::new(media.clone()),
            Arc::new(PrefixCdn::new(CDN_PREFIX)),
            PipelineService::new(Arc::new(pipelines.clone())),
            Arc::new(publisher),
        );

        Self {
            broker,
            media,
            pipelines,
            outbox,
            handlers,
        }
    }

    pub fn producer(&self) -> EventProducer {
        producer(&self.broker)
    }
}

pub fn producer(broker: &InMemoryBroker) -> EventProducer {
    EventProducer::new(Arc::new(broker.clone()), SOURCE)
}

pub fn upload(asset_id: &str, video_id: &str) -> UploadNotified {
    UploadNotified {
        asset_id: asset_id.to_string(),
        video_id: video_id.to_string(),
        storage_location: format!("s3://raw-uploads/{}/{}/source.mp4", asset_id, video_id),
        filename: "source.mp4".to_string(),
        size: 48_000_000,
        content_type: "video/mp4".to_string(),
        width: 1920,
        height: 1080,
        duration: 62.5,
        bitrate: 6_000_000,
        codec: "h264".to_string(),
    }
}

pub fn upload_event(asset_id: &str, video_id: &str) -> Event {
    Event::with_payload(event_types::VIDEO_UPLOADED, &upload(asset_id, video_id))
        .expect("upload payload serializes")
        .with_source("uploader")
}

pub fn analyze_completed(asset_id: &str, video_id: &str) -> JobCompletion {
    JobCompletion {
        job_type: "analyze".to_string(),
        asset_id: asset_id.to_string(),
        video_id: video_id.to_string(),
        success: true,
        width: 3840,
        height: 2160,
        duration: 62.48,
        bitrate: 12_000_000,
        codec: "hevc".to_string(),
        size: 48_000_000,
        content_type: "video/mp4".to_string(),
        ..JobCompletion::default()
    }
}

pub fn transcode_completed(asset_id: &str, video_id: &str, format: &str) -> JobCompletion {
    let manifest = if format == "dash" {
        "manifest.mpd"
    } else {
        "playlist.m3u8"
    };
    let key = format!("{}/{}/{}/main/{}", asset_id, video_id, format, manifest);
    JobCompletion {
        job_type: "transcode".to_string(),
        asset_id: asset_id.to_string(),
        video_id: video_id.to_string(),
        format: Some(format.to_string()),
        success: true,
        bucket: "cdn-media".to_string(),
        url: format!("s3://cdn-media/{}", key),
        key,
        segment_count: 11,
        avg_segment_duration: 6.0,
        segments: vec!["seg-0.ts".to_string(), "seg-1.ts".to_string()],
        video_codec: "h264".to_string(),
        audio_codec: "aac".to_string(),
        ..JobCompletion::default()
    }
}

pub fn transcode_failed(
    asset_id: &str,
    video_id: &str,
    format: &str,
    error: &str,
) -> JobCompletion {
    JobCompletion {
        job_type: "transcode".to_string(),
        asset_id: asset_id.to_string(),
        video_id: video_id.to_string(),
        format: Some(format.to_string()),
        success: false,
        error: Some(error.to_string()),
        ..JobCompletion::default()
    }
}

pub fn completion_event(event_type: &str, completion: &JobCompletion) -> Event {
    Event::with_payload(event_type, completion)
        .expect("completion payload serializes")
        .with_source("worker")
}

/// Poll `check` until it returns true or `limit` elapses.
pub async fn eventually<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(limit, async {
        loop {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}
