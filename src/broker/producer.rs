//! Envelope-aware producer.

use std::sync::Arc;
use std::time::Instant;

use super::transport::{BrokerMessage, Delivered, Headers, Producer};
use crate::error::Result;
use crate::event::Event;

pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_EVENT_ID: &str = "event-id";
pub const HEADER_EVENT_TYPE: &str = "event-type";
pub const HEADER_CORRELATION_ID: &str = "correlation-id";
pub const CLOUDEVENTS_CONTENT_TYPE: &str = "application/cloudevents+json";

/// Headers every produced message carries.
pub fn event_headers(event: &Event) -> Headers {
    let mut headers = vec![
        (HEADER_CONTENT_TYPE.to_string(), CLOUDEVENTS_CONTENT_TYPE.to_string()),
        (HEADER_EVENT_ID.to_string(), event.id.clone()),
        (HEADER_EVENT_TYPE.to_string(), event.event_type.clone()),
    ];
    if let Some(correlation_id) = &event.correlation_id {
        headers.push((HEADER_CORRELATION_ID.to_string(), correlation_id.clone()));
    }
    headers
}

fn merge_headers(mut base: Headers, overrides: Headers) -> Headers {
    for (name, value) in overrides {
        match base.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => base.push((name, value)),
        }
    }
    base
}

/// Sends [`Event`]s through a [`Producer`], stamping the default source,
/// validating, and keying by [`Event::partition_key`].
#[derive(Clone)]
pub struct EventProducer {
    producer: Arc<dyn Producer>,
    source: String,
}

impl EventProducer {
    /// `source` is stamped on events that arrive without one.
    pub fn new(producer: Arc<dyn Producer>, source: impl Into<String>) -> Self {
        Self {
            producer,
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Send `event` with the standard [`event_headers`].
    pub async fn send_event(&self, topic: &str, event: Event) -> Result<Delivered> {
        self.send_event_with_headers(topic, event, Headers::new()).await
    }

    /// Send `event` with `headers` laid over the standard ones. A header in
    /// `headers` replaces a standard header of the same name.
    pub async fn send_event_with_headers(
        &self,
        topic: &str,
        mut event: Event,
        headers: Headers,
    ) -> Result<Delivered> {
        if event.source.is_empty() {
            event.set_source(self.source.as_str());
        }
        event.validate()?;

        let payload = event.to_bytes()?;
        let key = event.partition_key();
        let message_size_bytes = payload.len();
        let message = BrokerMessage {
            topic: topic.to_string(),
            key: key.clone(),
            headers: merge_headers(event_headers(&event), headers),
            payload,
        };

        let started = Instant::now();
        match self.producer.send(message).await {
            Ok(delivered) => {
                tracing::info!(
                    topic,
                    event_id = %event.id,
                    event_type = %event.event_type,
                    partition_key = %key,
                    message_size_bytes,
                    partition = delivered.partition,
                    offset = delivered.offset,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "event sent"
                );
                Ok(delivered)
            }
            Err(err) => {
                tracing::error!(
                    topic,
                    event_id = %event.id,
                    event_type = %event.event_type,
                    partition_key = %key,
                    message_size_bytes,
                    error = %err,
                    "failed to send event"
                );
                Err(err)
            }
        }
    }
}
