//! Topic names, event type names, and the closed set of inbound topics.

use std::fmt;

use crate::media::TranscodeFormat;

/// Event `type` values.
pub mod event_types {
    pub const VIDEO_UPLOADED: &str = "com.mediapipeline.video.uploaded";
    pub const ANALYZE_REQUESTED: &str = "com.mediapipeline.job.analyze.requested";
    pub const ANALYZE_COMPLETED: &str = "com.mediapipeline.job.analyze.completed";
    pub const TRANSCODE_REQUESTED: &str = "com.mediapipeline.job.transcode.requested";
    pub const TRANSCODE_COMPLETED: &str = "com.mediapipeline.job.transcode.completed";
    pub const VIDEO_STATUS_CHANGED: &str = "com.mediapipeline.video.status.changed";
}

pub const RAW_VIDEO_UPLOADED_TOPIC: &str = "raw-video-uploaded";
pub const ANALYZE_JOB_REQUESTED_TOPIC: &str = "analyze.job.requested";
pub const ANALYZE_JOB_COMPLETED_TOPIC: &str = "analyze.job.completed";
pub const HLS_JOB_REQUESTED_TOPIC: &str = "hls.job.requested";
pub const HLS_JOB_COMPLETED_TOPIC: &str = "hls.job.completed";
pub const DASH_JOB_REQUESTED_TOPIC: &str = "dash.job.requested";
pub const DASH_JOB_COMPLETED_TOPIC: &str = "dash.job.completed";
pub const MEDIA_STATUS_CHANGED_TOPIC: &str = "media.status.changed";

/// Every topic this service consumes. Matching on it is exhaustive, so adding
/// a topic without a handler fails to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundTopic {
    UploadNotified,
    AnalyzeCompleted,
    TranscodeCompleted(TranscodeFormat),
}

impl InboundTopic {
    pub const ALL: [InboundTopic; 4] = [
        InboundTopic::UploadNotified,
        InboundTopic::AnalyzeCompleted,
        InboundTopic::TranscodeCompleted(TranscodeFormat::Hls),
        InboundTopic::TranscodeCompleted(TranscodeFormat::Dash),
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InboundTopic::UploadNotified => RAW_VIDEO_UPLOADED_TOPIC,
            InboundTopic::AnalyzeCompleted => ANALYZE_JOB_COMPLETED_TOPIC,
            InboundTopic::TranscodeCompleted(TranscodeFormat::Hls) => HLS_JOB_COMPLETED_TOPIC,
            InboundTopic::TranscodeCompleted(TranscodeFormat::Dash) => DASH_JOB_COMPLETED_TOPIC,
        }
    }

    /// `None` for a topic no handler consumes.
    pub fn parse(topic: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == topic)
    }
}

impl fmt::Display for InboundTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topics this service produces to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutboundTopic {
    AnalyzeRequested,
    TranscodeRequested(TranscodeFormat),
    MediaStatusChanged,
}

impl OutboundTopic {
    pub fn as_str(self) -> &'static str {
        match self {
            OutboundTopic::AnalyzeRequested => ANALYZE_JOB_REQUESTED_TOPIC,
            OutboundTopic::TranscodeRequested(TranscodeFormat::Hls) => HLS_JOB_REQUESTED_TOPIC,
            OutboundTopic::TranscodeRequested(TranscodeFormat::Dash) => DASH_JOB_REQUESTED_TOPIC,
            OutboundTopic::MediaStatusChanged => MEDIA_STATUS_CHANGED_TOPIC,
        }
    }
}

impl fmt::Display for OutboundTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_topics_parse_back() {
        for topic in InboundTopic::ALL {
            assert_eq!(InboundTopic::parse(topic.as_str()), Some(topic));
        }
        assert_eq!(InboundTopic::parse(MEDIA_STATUS_CHANGED_TOPIC), None);
    }

    #[test]
    fn request_topics_are_per_format() {
        assert_eq!(
            OutboundTopic::TranscodeRequested(TranscodeFormat::Dash).as_str(),
            "dash.job.requested"
        );
    }
}
