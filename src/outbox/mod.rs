//! Transactional outbox: events are staged in a durable store and drained
//! into the broker by a background dispatcher.

pub mod dispatcher;
pub mod publisher;
pub mod record;
pub mod store;

pub use dispatcher::{DispatchReport, DispatcherStats, OutboxDispatcher};
pub use publisher::{EventPublisher, OutboxPublisher};
pub use record::{OutboxRecord, OutboxStatus};
pub use store::{InMemoryOutboxStore, OutboxStore};
