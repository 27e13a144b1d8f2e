use crate::error::Result;
use crate::event::envelope::Event;
use crate::event::payloads::{JobCompletion, UploadNotified};
use crate::event::topics::InboundTopic;
use crate::media::TranscodeFormat;

/// An inbound event decoded into the payload its topic carries.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    UploadNotified(UploadNotified),
    AnalyzeCompleted(JobCompletion),
    TranscodeCompleted {
        format: TranscodeFormat,
        completion: JobCompletion,
    },
}

impl InboundEvent {
    /// Decode and validate `event.data` for `topic`. Every failure here is a
    /// validation error.
    pub fn decode(topic: InboundTopic, event: &Event) -> Result<Self> {
        match topic {
            InboundTopic::UploadNotified => {
                let upload: UploadNotified = event.data_as()?;
                upload.validate()?;
                Ok(InboundEvent::UploadNotified(upload))
            }
            InboundTopic::AnalyzeCompleted => {
                let completion: JobCompletion = event.data_as()?;
                completion.validate()?;
                Ok(InboundEvent::AnalyzeCompleted(completion))
            }
            InboundTopic::TranscodeCompleted(format) => {
                let completion: JobCompletion = event.data_as()?;
                completion.validate()?;
                Ok(InboundEvent::TranscodeCompleted { format, completion })
            }
        }
    }

    pub fn asset_id(&self) -> &str {
        match self {
            InboundEvent::UploadNotified(upload) => &upload.asset_id,
            InboundEvent::AnalyzeCompleted(completion)
            | InboundEvent::TranscodeCompleted { completion, .. } => &completion.asset_id,
        }
    }
}
