use super::EventHandlers;
use crate::error::Result;
use crate::event::payloads::JOB_TYPE_ANALYZE;
use crate::event::{
    build_job_correlation_id, event_types, Event, JobRequested, OutboundTopic, UploadNotified,
    DEFAULT_QUALITY,
};
use crate::media::{
    base_name, StorageLocation, TechnicalMetadata, UpsertVideoCommand, VideoFormat, VideoStatus,
};
use crate::pipeline::steps;

impl EventHandlers {
    /// Record the raw upload and request its analysis.
    pub(crate) async fn on_upload_notified(
        &self,
        trigger: &Event,
        upload: UploadNotified,
    ) -> Result<()> {
        let asset_id = upload.asset_id.as_str();
        let video_id = upload.video_id.as_str();

        let storage = StorageLocation::from_url(&upload.storage_location);
        let label = if upload.filename.is_empty() {
            base_name(&upload.storage_location).to_string()
        } else {
            upload.filename.clone()
        };
        let metadata = TechnicalMetadata {
            width: upload.width,
            height: upload.height,
            duration: upload.duration,
            bitrate: upload.bitrate,
            codec: upload.codec.clone(),
            size: upload.size,
            ..TechnicalMetadata::default()
        };
        let cmd = UpsertVideoCommand::new(
            asset_id,
            Some(video_id.to_string()),
            VideoFormat::Raw,
            VideoStatus::Ready,
        )
        .with_label(label)
        .with_storage(storage)
        .with_content_type(upload.content_type.as_str())
        .with_metadata(metadata);
        self.media.upsert_video(cmd).await?;

        let correlation_id =
            build_job_correlation_id(JOB_TYPE_ANALYZE, "", DEFAULT_QUALITY, asset_id, video_id);
        self.pipeline
            .mark_requested(
                asset_id,
                video_id,
                steps::ANALYZE,
                Some(&correlation_id),
                Some(&correlation_id),
            )
            .await?;

        let request = JobRequested::analyze(asset_id, video_id, &upload.storage_location);
        let event = Event::with_payload(event_types::ANALYZE_REQUESTED, &request)?
            .with_correlation_id(correlation_id.as_str())
            .with_causation_id(trigger.id.as_str());
        self.publisher
            .publish(OutboundTopic::AnalyzeRequested.as_str(), event)
            .await?;

        tracing::info!(
            asset_id,
            video_id,
            correlation_id = %correlation_id,
            "raw video recorded, analysis requested"
        );
        Ok(())
    }
}
