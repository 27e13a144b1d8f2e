use super::EventHandlers;
use crate::error::{Error, Result};
use crate::event::payloads::JOB_TYPE_TRANSCODE;
use crate::event::{
    build_job_correlation_id, event_types, Event, JobRequested, OutboundTopic, DEFAULT_QUALITY,
};
use crate::media::{StorageLocation, TranscodeFormat, UpsertVideoCommand, VideoStatus};

/// An explicit request to transcode one video into one streaming format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeRequest {
    pub asset_id: String,
    pub video_id: String,
    pub format: TranscodeFormat,
    /// Location of the source file the transcoder reads.
    pub input_url: String,
    /// Bucket the rendition is written to.
    pub bucket: String,
}

impl TranscodeRequest {
    /// `{asset}/{video}/{format}/main/{manifest}`
    pub fn output_key(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.asset_id,
            self.video_id,
            self.format,
            DEFAULT_QUALITY,
            self.format.manifest_name()
        )
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("assetId", &self.asset_id),
            ("videoId", &self.video_id),
            ("input", &self.input_url),
        ] {
            if value.trim().is_empty() {
                return Err(Error::validation(format!("{} is required", field)));
            }
        }
        Ok(())
    }
}

impl EventHandlers {
    /// Stage a transcode job: placeholder rendition, request event, pipeline
    /// step. Returns the job's correlation id.
    ///
    /// Nothing inside the pipeline calls this; it is triggered from outside.
    pub async fn request_transcode(&self, request: TranscodeRequest) -> Result<String> {
        request.validate()?;
        let format = request.format;
        let asset_id = request.asset_id.as_str();
        let video_id = request.video_id.as_str();
        let output_key = request.output_key();

        let placeholder = UpsertVideoCommand::new(
            asset_id,
            Some(video_id.to_string()),
            format.video_format(),
            VideoStatus::Transcoding,
        )
        .with_label(format.manifest_name())
        .with_storage(StorageLocation {
            bucket: request.bucket.clone(),
            key: output_key.clone(),
            url: String::new(),
        })
        .with_content_type(format.content_type());
        self.media.upsert_video(placeholder).await?;

        let correlation_id = build_job_correlation_id(
            JOB_TYPE_TRANSCODE,
            format.as_str(),
            DEFAULT_QUALITY,
            asset_id,
            video_id,
        );
        let job = JobRequested::transcode(
            asset_id,
            video_id,
            &request.input_url,
            format,
            DEFAULT_QUALITY,
        )
        .with_output(request.bucket.as_str(), output_key.as_str());
        let event = Event::with_payload(event_types::TRANSCODE_REQUESTED, &job)?
            .with_correlation_id(correlation_id.as_str());
        self.publisher
            .publish(OutboundTopic::TranscodeRequested(format).as_str(), event)
            .await?;

        self.pipeline
            .mark_requested(
                asset_id,
                video_id,
                format.step(),
                Some(&correlation_id),
                Some(&correlation_id),
            )
            .await?;

        tracing::info!(
            asset_id,
            video_id,
            format = %format,
            correlation_id = %correlation_id,
            "transcode requested"
        );
        Ok(correlation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(format: TranscodeFormat) -> TranscodeRequest {
        TranscodeRequest {
            asset_id: "a1".to_string(),
            video_id: "v1".to_string(),
            format,
            input_url: "s3://raw/a1/v1/source.mp4".to_string(),
            bucket: "cdn-media".to_string(),
        }
    }

    #[test]
    fn output_key_layout() {
        assert_eq!(request(TranscodeFormat::Hls).output_key(), "a1/v1/hls/main/playlist.m3u8");
        assert_eq!(request(TranscodeFormat::Dash).output_key(), "a1/v1/dash/main/manifest.mpd");
    }

    #[test]
    fn input_is_required() {
        let mut bad = request(TranscodeFormat::Hls);
        bad.input_url.clear();
        assert!(bad.validate().unwrap_err().to_string().contains("input"));
    }
}
