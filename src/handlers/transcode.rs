use super::EventHandlers;
use crate::error::Result;
use crate::event::payloads::JOB_TYPE_TRANSCODE;
use crate::event::{
    build_job_correlation_id, event_types, Event, JobCompletion, MediaStatusChanged,
    OutboundTopic, DEFAULT_QUALITY,
};
use crate::media::{
    base_name, SegmentInfo, StorageLocation, StreamInfo, TechnicalMetadata, TranscodeFormat,
    UpsertVideoCommand, VideoStatus,
};

impl EventHandlers {
    /// Record a finished (or failed) rendition and announce its new status.
    pub(crate) async fn on_transcode_completed(
        &self,
        trigger: &Event,
        format: TranscodeFormat,
        completion: JobCompletion,
    ) -> Result<()> {
        if completion.success {
            self.record_rendition(trigger, format, &completion).await
        } else {
            self.record_failed_rendition(trigger, format, &completion).await
        }
    }

    async fn record_failed_rendition(
        &self,
        trigger: &Event,
        format: TranscodeFormat,
        completion: &JobCompletion,
    ) -> Result<()> {
        let asset_id = completion.asset_id.as_str();
        let video_id = completion.video_id.as_str();
        let error = completion.error_message();

        let cmd = UpsertVideoCommand::new(
            asset_id,
            Some(video_id.to_string()),
            format.video_format(),
            VideoStatus::Failed,
        )
        .with_label(rendition_label(format, completion))
        .with_content_type(rendition_content_type(format, completion));
        self.media.upsert_video(cmd).await?;

        self.pipeline
            .mark_failed(asset_id, video_id, format.step(), &error)
            .await?;

        tracing::warn!(asset_id, video_id, format = %format, error = %error, "transcode failed");
        let status = MediaStatusChanged {
            asset_id: asset_id.to_string(),
            video_id: video_id.to_string(),
            format,
            status: VideoStatus::Failed,
            error: Some(error),
            play_url: None,
        };
        self.publish_status(trigger, status).await
    }

    async fn record_rendition(
        &self,
        trigger: &Event,
        format: TranscodeFormat,
        completion: &JobCompletion,
    ) -> Result<()> {
        let asset_id = completion.asset_id.as_str();
        let video_id = completion.video_id.as_str();

        let play = self.cdn.build_play_url(&completion.key);
        let cmd = UpsertVideoCommand::new(
            asset_id,
            Some(video_id.to_string()),
            format.video_format(),
            VideoStatus::Ready,
        )
        .with_label(rendition_label(format, completion))
        .with_storage(rendition_storage(completion))
        .with_content_type(rendition_content_type(format, completion))
        .with_metadata(TechnicalMetadata::from(completion))
        .with_segments(SegmentInfo {
            segment_count: completion.segment_count,
            avg_segment_duration: completion.avg_segment_duration,
            segments: completion.segments.clone(),
        })
        .with_stream(StreamInfo {
            cdn_prefix: play.cdn_prefix,
            play_url: play.play_url.clone(),
        });
        self.media.upsert_video(cmd).await?;

        self.pipeline
            .mark_completed(asset_id, video_id, format.step())
            .await?;

        tracing::info!(
            asset_id,
            video_id,
            format = %format,
            play_url = %play.play_url,
            "rendition ready"
        );
        let status = MediaStatusChanged {
            asset_id: asset_id.to_string(),
            video_id: video_id.to_string(),
            format,
            status: VideoStatus::Ready,
            error: None,
            play_url: Some(play.play_url),
        };
        self.publish_status(trigger, status).await
    }

    /// Carry the trigger's correlation id forward (recomputing it when the
    /// worker dropped it) and name the trigger as the cause.
    async fn publish_status(&self, trigger: &Event, status: MediaStatusChanged) -> Result<()> {
        let correlation_id = trigger.correlation_id.clone().unwrap_or_else(|| {
            build_job_correlation_id(
                JOB_TYPE_TRANSCODE,
                status.format.as_str(),
                DEFAULT_QUALITY,
                &status.asset_id,
                &status.video_id,
            )
        });
        let event = Event::with_payload(event_types::VIDEO_STATUS_CHANGED, &status)?
            .with_correlation_id(correlation_id)
            .with_causation_id(trigger.id.as_str());
        self.publisher
            .publish(OutboundTopic::MediaStatusChanged.as_str(), event)
            .await
    }
}

fn rendition_label(format: TranscodeFormat, completion: &JobCompletion) -> String {
    match base_name(&completion.key) {
        "" => format.manifest_name().to_string(),
        name => name.to_string(),
    }
}

fn rendition_content_type(format: TranscodeFormat, completion: &JobCompletion) -> String {
    if completion.content_type.is_empty() {
        format.content_type().to_string()
    } else {
        completion.content_type.clone()
    }
}

/// Prefer the worker's URL; fall back to its bucket and key.
fn rendition_storage(completion: &JobCompletion) -> StorageLocation {
    let mut storage = StorageLocation::from_url(&completion.url);
    if storage.bucket.is_empty() {
        storage.bucket = completion.bucket.clone();
    }
    if storage.key.is_empty() {
        storage.key = completion.key.clone();
    }
    storage
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_falls_back_to_manifest_name() {
        let mut completion = JobCompletion::default();
        assert_eq!(rendition_label(TranscodeFormat::Hls, &completion), "playlist.m3u8");

        completion.key = "a1/v1/dash/main/manifest.mpd".to_string();
        assert_eq!(rendition_label(TranscodeFormat::Dash, &completion), "manifest.mpd");
    }

    #[test]
    fn storage_prefers_url_then_fields() {
        let completion = JobCompletion {
            url: "s3://cdn-media/a1/v1/hls/main/playlist.m3u8".to_string(),
            bucket: "ignored".to_string(),
            ..JobCompletion::default()
        };
        let storage = rendition_storage(&completion);
        assert_eq!(storage.bucket, "cdn-media");
        assert_eq!(storage.key, "a1/v1/hls/main/playlist.m3u8");

        let completion = JobCompletion {
            bucket: "cdn-media".to_string(),
            key: "a1/v1/hls/main/playlist.m3u8".to_string(),
            ..JobCompletion::default()
        };
        let storage = rendition_storage(&completion);
        assert_eq!(storage.bucket, "cdn-media");
        assert!(storage.url.is_empty());
    }

    #[test]
    fn content_type_defaults_per_format() {
        let completion = JobCompletion::default();
        assert_eq!(
            rendition_content_type(TranscodeFormat::Dash, &completion),
            "application/dash+xml"
        );
    }
}
