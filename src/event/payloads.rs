//! Typed `data` payloads for every topic this service consumes or produces.
//!
//! All payloads use camelCase field names on the wire.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::media::{TranscodeFormat, VideoStatus};

pub const JOB_TYPE_ANALYZE: &str = "analyze";
pub const JOB_TYPE_TRANSCODE: &str = "transcode";

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Emitted by the upload path once a raw file has landed in storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadNotified {
    pub asset_id: String,
    pub video_id: String,
    pub storage_location: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    pub bitrate: u64,
    pub codec: String,
}

impl UploadNotified {
    pub fn validate(&self) -> Result<()> {
        require("assetId", &self.asset_id)?;
        require("videoId", &self.video_id)?;
        require("storageLocation", &self.storage_location)?;
        require("contentType", &self.content_type)
    }
}

/// Result reported by an analysis or transcode worker.
///
/// Every field is optional on the wire; missing numbers decode as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobCompletion {
    pub job_type: String,
    pub asset_id: String,
    pub video_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    pub bitrate: u64,
    pub codec: String,
    pub size: u64,
    pub content_type: String,
    pub bucket: String,
    pub key: String,
    pub url: String,
    pub segment_count: u32,
    pub video_codec: String,
    pub audio_codec: String,
    pub avg_segment_duration: f64,
    pub segments: Vec<String>,
    pub frame_rate: String,
    pub audio_channels: u32,
    pub audio_sample_rate: u32,
}

impl JobCompletion {
    pub fn validate(&self) -> Result<()> {
        require("assetId", &self.asset_id)?;
        require("videoId", &self.video_id)
    }

    /// Worker-supplied error text, or a generic message when the worker sent
    /// none.
    pub fn error_message(&self) -> String {
        self.error
            .as_deref()
            .filter(|msg| !msg.is_empty())
            .unwrap_or("job failed without an error message")
            .to_string()
    }
}

/// Work order published for an analysis or transcode worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequested {
    pub job_type: String,
    pub input: String,
    pub asset_id: String,
    pub video_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
}

impl JobRequested {
    /// Analysis request for the raw file at `input`.
    pub fn analyze(asset_id: &str, video_id: &str, input: &str) -> Self {
        Self {
            job_type: JOB_TYPE_ANALYZE.to_string(),
            input: input.to_string(),
            asset_id: asset_id.to_string(),
            video_id: video_id.to_string(),
            ..Self::default()
        }
    }

    /// Transcode request for one format and quality.
    pub fn transcode(
        asset_id: &str,
        video_id: &str,
        input: &str,
        format: TranscodeFormat,
        quality: &str,
    ) -> Self {
        Self {
            job_type: JOB_TYPE_TRANSCODE.to_string(),
            input: input.to_string(),
            asset_id: asset_id.to_string(),
            video_id: video_id.to_string(),
            format: Some(format.as_str().to_string()),
            quality: Some(quality.to_string()),
            ..Self::default()
        }
    }

    /// Where the worker writes its output.
    pub fn with_output(mut self, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        self.output_bucket = Some(bucket.into());
        self.output_key = Some(key.into());
        self
    }
}

/// Published when a transcoded rendition becomes ready or fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStatusChanged {
    pub asset_id: String,
    pub video_id: String,
    pub format: TranscodeFormat,
    pub status: VideoStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completion_tolerates_missing_fields() {
        let completion: JobCompletion =
            serde_json::from_value(json!({ "assetId": "a1", "videoId": "v1", "success": true }))
                .unwrap();
        assert!(completion.success);
        assert_eq!(completion.width, 0);
        assert!(completion.segments.is_empty());
        assert!(completion.validate().is_ok());
    }

    #[test]
    fn completion_requires_ids() {
        let completion: JobCompletion =
            serde_json::from_value(json!({ "videoId": "v1", "success": false })).unwrap();
        let err = completion.validate().unwrap_err();
        assert!(err.to_string().contains("assetId"));
    }

    #[test]
    fn completion_error_message_falls_back() {
        let mut completion = JobCompletion::default();
        assert!(!completion.error_message().is_empty());
        completion.error = Some("encoder crash".to_string());
        assert_eq!(completion.error_message(), "encoder crash");
    }

    #[test]
    fn upload_requires_storage_and_content_type() {
        let upload = UploadNotified {
            asset_id: "a1".to_string(),
            video_id: "v1".to_string(),
            storage_location: "s3://raw/a1/v1.mp4".to_string(),
            ..UploadNotified::default()
        };
        assert!(upload.validate().unwrap_err().to_string().contains("contentType"));
    }

    #[test]
    fn job_requested_omits_unset_optionals() {
        let wire =
            serde_json::to_value(JobRequested::analyze("a1", "v1", "s3://raw/x.mp4")).unwrap();
        assert_eq!(wire["jobType"], json!("analyze"));
        assert!(wire.get("format").is_none());
        assert!(wire.get("outputKey").is_none());
    }

    #[test]
    fn status_changed_is_camel_case() {
        let wire = serde_json::to_value(MediaStatusChanged {
            asset_id: "a1".to_string(),
            video_id: "v1".to_string(),
            format: TranscodeFormat::Hls,
            status: VideoStatus::Ready,
            error: None,
            play_url: Some("https://cdn/a1".to_string()),
        })
        .unwrap();
        assert_eq!(wire["status"], json!("ready"));
        assert_eq!(wire["playUrl"], json!("https://cdn/a1"));
        assert_eq!(wire["format"], json!("hls"));
    }
}
