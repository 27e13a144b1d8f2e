use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a stored media record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Pending,
    Analyzing,
    Transcoding,
    Ready,
    Failed,
}

impl VideoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Analyzing => "analyzing",
            VideoStatus::Transcoding => "transcoding",
            VideoStatus::Ready => "ready",
            VideoStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container format of a stored media record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    Raw,
    Hls,
    Dash,
}

impl VideoFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            VideoFormat::Raw => "raw",
            VideoFormat::Hls => "hls",
            VideoFormat::Dash => "dash",
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Streaming formats produced by the transcoder. Each one has its own request
/// and completion topic and its own pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscodeFormat {
    Hls,
    Dash,
}

impl TranscodeFormat {
    pub const ALL: [TranscodeFormat; 2] = [TranscodeFormat::Hls, TranscodeFormat::Dash];

    pub fn as_str(self) -> &'static str {
        self.video_format().as_str()
    }

    /// Catalog format of this rendition.
    pub fn video_format(self) -> VideoFormat {
        match self {
            TranscodeFormat::Hls => VideoFormat::Hls,
            TranscodeFormat::Dash => VideoFormat::Dash,
        }
    }

    /// Pipeline step tracking this format's transcode job.
    pub fn step(self) -> &'static str {
        self.as_str()
    }

    pub fn content_type(self) -> &'static str {
        match self {
            TranscodeFormat::Hls => "application/x-mpegURL",
            TranscodeFormat::Dash => "application/dash+xml",
        }
    }

    /// File name of the top-level playlist or manifest.
    pub fn manifest_name(self) -> &'static str {
        match self {
            TranscodeFormat::Hls => "playlist.m3u8",
            TranscodeFormat::Dash => "manifest.mpd",
        }
    }
}

impl fmt::Display for TranscodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a media file lives in object storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    pub bucket: String,
    pub key: String,
    pub url: String,
}

impl StorageLocation {
    /// Split `s3://bucket/key` into its parts. Other URLs are kept verbatim
    /// with empty bucket and key.
    pub fn from_url(url: &str) -> Self {
        let parsed = url
            .strip_prefix("s3://")
            .and_then(|rest| rest.split_once('/'))
            .filter(|(bucket, key)| !bucket.is_empty() && !key.is_empty());

        match parsed {
            Some((bucket, key)) => Self {
                bucket: bucket.to_string(),
                key: key.to_string(),
                url: url.to_string(),
            },
            None => Self {
                url: url.to_string(),
                ..Self::default()
            },
        }
    }
}

/// Last path segment of an object key.
pub(crate) fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}
