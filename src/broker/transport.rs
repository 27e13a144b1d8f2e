//! Transport seams between the pipeline and a partitioned message broker.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Message headers, in insertion order.
pub type Headers = Vec<(String, String)>;

/// A message on its way to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    /// Messages sharing a key land on the same partition.
    pub key: String,
    pub headers: Headers,
    pub payload: Vec<u8>,
}

impl BrokerMessage {
    /// First header named `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Where the broker stored a sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivered {
    pub partition: usize,
    pub offset: u64,
}

/// One topic partition owned by a consumer worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionClaim {
    pub topic: String,
    pub partition: usize,
}

/// A message received from a partition claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: usize,
    pub offset: u64,
    pub key: String,
    pub headers: Headers,
    pub payload: Vec<u8>,
}

impl Delivery {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

#[async_trait]
pub trait Producer: Send + Sync {
    /// Send one message. Failures are transient.
    async fn send(&self, message: BrokerMessage) -> Result<Delivered>;
}

/// Pull-based consumer side of the broker.
///
/// Within one claim, deliveries come in offset order. The next message is
/// only handed out after the current one was acked or nacked.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Join the consumer group for `topics` and return the partitions this
    /// instance owns.
    async fn assign(&self, topics: &[String]) -> Result<Vec<PartitionClaim>>;

    /// Wait up to `timeout` for the next message on `claim`.
    async fn poll(&self, claim: &PartitionClaim, timeout: Duration) -> Result<Option<Delivery>>;

    /// Commit the delivery's offset.
    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// Leave the delivery uncommitted so it is delivered again.
    async fn nack(&self, delivery: &Delivery, reason: &str) -> Result<()>;
}
