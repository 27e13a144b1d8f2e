//! Asynchronous media pipeline orchestration.
//!
//! Upload and worker-completion events come in through the [`Consumer`], are
//! turned into catalog writes and [`Pipeline`] step transitions by the
//! [`EventHandlers`], and follow-up events leave through the transactional
//! outbox ([`OutboxPublisher`] and [`OutboxDispatcher`]).

pub mod broker;
pub mod config;
pub mod consumer;
pub mod error;
pub mod event;
pub mod handlers;
pub mod media;
pub mod outbox;
pub mod pipeline;
pub mod runtime;
pub mod telemetry;

pub use broker::{EventProducer, InMemoryBroker};
pub use config::{Config, ConsumerConfig, DispatcherConfig, LogConfig};
pub use consumer::{Consumer, ConsumerStats, DeliveryOutcome};
pub use error::{Error, ErrorKind, Result};
pub use event::{build_job_correlation_id, Event, InboundEvent, InboundTopic};
pub use handlers::{EventHandlers, TranscodeRequest};
pub use outbox::{EventPublisher, OutboxDispatcher, OutboxPublisher};
pub use pipeline::{Pipeline, PipelineService, StepStatus};
pub use runtime::{Collaborators, MediaPipeline, RuntimeStats};
pub use telemetry::init_tracing;
