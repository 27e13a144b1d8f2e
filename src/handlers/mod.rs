//! Orchestration: turns inbound worker events into catalog writes, pipeline
//! transitions and follow-up events.
//!
//! Handlers never talk to the broker. Everything they emit goes through the
//! [`EventPublisher`], so the delivery strategy (outbox or direct) is invisible
//! here. Errors are returned unchanged; the consumer decides between dropping
//! and redelivering based on [`Error::kind`](crate::error::Error::kind).

mod analyze;
mod request_transcode;
mod transcode;
mod upload;

use std::sync::Arc;

use crate::error::Result;
use crate::event::{Event, InboundEvent, InboundTopic};
use crate::media::{CdnService, MediaCommandService};
use crate::outbox::EventPublisher;
use crate::pipeline::PipelineService;

pub use request_transcode::TranscodeRequest;

#[derive(Clone)]
pub struct EventHandlers {
    media: Arc<dyn MediaCommandService>,
    cdn: Arc<dyn CdnService>,
    pipeline: PipelineService,
    publisher: Arc<dyn EventPublisher>,
}

impl EventHandlers {
    /// All collaborators are shared; cloning the handlers is cheap.
    pub fn new(
        media: Arc<dyn MediaCommandService>,
        cdn: Arc<dyn CdnService>,
        pipeline: PipelineService,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            media,
            cdn,
            pipeline,
            publisher,
        }
    }

    pub fn pipeline(&self) -> &PipelineService {
        &self.pipeline
    }

    /// Decode `event` for `topic` and run its handler.
    pub async fn dispatch(&self, topic: InboundTopic, event: &Event) -> Result<()> {
        let inbound = InboundEvent::decode(topic, event)?;
        self.handle(event, inbound).await
    }

    /// Run the handler for an already decoded event. `trigger` is the
    /// envelope it came in, used for correlation and causation.
    pub async fn handle(&self, trigger: &Event, inbound: InboundEvent) -> Result<()> {
        match inbound {
            InboundEvent::UploadNotified(upload) => self.on_upload_notified(trigger, upload).await,
            InboundEvent::AnalyzeCompleted(completion) => {
                self.on_analyze_completed(trigger, completion).await
            }
            InboundEvent::TranscodeCompleted { format, completion } => {
                self.on_transcode_completed(trigger, format, completion).await
            }
        }
    }
}
