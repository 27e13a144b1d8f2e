use std::sync::Arc;

use async_trait::async_trait;

use super::store::OutboxStore;
use crate::broker::{event_headers, EventProducer};
use crate::error::Result;
use crate::event::Event;

/// The only way handlers emit events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, event: Event) -> Result<()>;
}

/// Writes events to an [`OutboxStore`] when one is configured, otherwise
/// sends them straight through the broker.
#[derive(Clone)]
pub struct OutboxPublisher {
    store: Option<Arc<dyn OutboxStore>>,
    producer: EventProducer,
}

impl OutboxPublisher {
    /// Publisher that always sends directly.
    pub fn direct(producer: EventProducer) -> Self {
        Self {
            store: None,
            producer,
        }
    }

    /// Stage events in `store` instead of sending them.
    pub fn with_store(mut self, store: Arc<dyn OutboxStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn uses_outbox(&self) -> bool {
        self.store.is_some()
    }
}

#[async_trait]
impl EventPublisher for OutboxPublisher {
    async fn publish(&self, topic: &str, mut event: Event) -> Result<()> {
        let Some(store) = &self.store else {
            self.producer.send_event(topic, event).await?;
            return Ok(());
        };

        if event.source.is_empty() {
            event.set_source(self.producer.source());
        }
        event.validate()?;

        let payload = event.to_bytes()?;
        let id = store.enqueue(topic, payload, event_headers(&event)).await?;
        tracing::debug!(
            topic,
            record_id = %id,
            event_id = %event.id,
            event_type = %event.event_type,
            "event staged in outbox"
        );
        Ok(())
    }
}
