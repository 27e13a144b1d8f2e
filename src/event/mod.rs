pub mod correlation;
pub mod envelope;
pub mod inbound;
pub mod payloads;
pub mod topics;

pub use correlation::{build_job_correlation_id, CORRELATION_PREFIX, DEFAULT_QUALITY};
pub use envelope::{Event, CONTENT_TYPE_JSON, SPEC_VERSION};
pub use inbound::InboundEvent;
pub use payloads::{JobCompletion, JobRequested, MediaStatusChanged, UploadNotified};
pub use topics::{event_types, InboundTopic, OutboundTopic};
