//! Partitioned in-memory broker for tests and single-process runs.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::transport::{BrokerMessage, Delivered, Delivery, PartitionClaim, Producer, Subscriber};
use crate::error::{Error, Result};
use crate::event::Event;

const POLL_INTERVAL: Duration = Duration::from_millis(2);

#[derive(Default)]
struct PartitionLog {
    messages: Vec<BrokerMessage>,
    /// Next offset to hand out.
    cursor: usize,
    /// Offsets below this one are committed.
    committed: usize,
}

/// A broker with one consumer group.
///
/// Every topic has a fixed number of partitions. A message's partition is
/// derived from its key, so messages sharing a key stay ordered. `ack`
/// commits an offset; `nack` rewinds the partition cursor so the message is
/// delivered again on the next poll.
///
/// Clone-friendly via Arc; clones share the same logs.
#[derive(Clone)]
pub struct InMemoryBroker {
    partitions: usize,
    topics: Arc<Mutex<HashMap<String, Vec<PartitionLog>>>>,
    failing_sends: Arc<AtomicUsize>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(1)
    }
}

impl InMemoryBroker {
    /// A broker with `partitions` partitions per topic, at least one.
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: partitions.max(1),
            topics: Arc::new(Mutex::new(HashMap::new())),
            failing_sends: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Make the next `count` sends fail as if the broker were unreachable.
    pub fn fail_next_sends(&self, count: usize) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }

    /// Partition a message with `key` lands on.
    pub fn partition_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.partitions as u64) as usize
    }

    /// Every message on `topic`, partition by partition in offset order.
    pub fn messages(&self, topic: &str) -> Result<Vec<BrokerMessage>> {
        let topics = self.lock()?;
        Ok(topics
            .get(topic)
            .map(|logs| {
                logs.iter()
                    .flat_map(|log| log.messages.iter().cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Parsed envelopes of every message on `topic`.
    pub fn events(&self, topic: &str) -> Result<Vec<Event>> {
        self.messages(topic)?
            .iter()
            .map(|message| Event::from_slice(&message.payload))
            .collect()
    }

    /// Messages on `topic` not yet committed.
    pub fn uncommitted(&self, topic: &str) -> Result<usize> {
        let topics = self.lock()?;
        Ok(topics
            .get(topic)
            .map(|logs| {
                logs.iter()
                    .map(|log| log.messages.len() - log.committed)
                    .sum()
            })
            .unwrap_or(0))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<PartitionLog>>>> {
        self.topics.lock().map_err(|_| Error::LockPoisoned("broker"))
    }

    fn new_topic(&self) -> Vec<PartitionLog> {
        (0..self.partitions).map(|_| PartitionLog::default()).collect()
    }

    fn take_failure(&self) -> bool {
        self.failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn next_delivery(&self, claim: &PartitionClaim) -> Result<Option<Delivery>> {
        let mut topics = self.lock()?;
        let log = topics
            .get_mut(&claim.topic)
            .and_then(|logs| logs.get_mut(claim.partition))
            .ok_or_else(|| {
                Error::not_found("partition", format!("{}/{}", claim.topic, claim.partition))
            })?;

        let Some(message) = log.messages.get(log.cursor) else {
            return Ok(None);
        };
        let delivery = Delivery {
            topic: claim.topic.clone(),
            partition: claim.partition,
            offset: log.cursor as u64,
            key: message.key.clone(),
            headers: message.headers.clone(),
            payload: message.payload.clone(),
        };
        log.cursor += 1;
        Ok(Some(delivery))
    }

    fn with_partition<T>(
        &self,
        delivery: &Delivery,
        f: impl FnOnce(&mut PartitionLog) -> T,
    ) -> Result<T> {
        let mut topics = self.lock()?;
        topics
            .get_mut(&delivery.topic)
            .and_then(|logs| logs.get_mut(delivery.partition))
            .map(f)
            .ok_or_else(|| {
                Error::not_found("partition", format!("{}/{}", delivery.topic, delivery.partition))
            })
    }
}

#[async_trait]
impl Producer for InMemoryBroker {
    async fn send(&self, message: BrokerMessage) -> Result<Delivered> {
        if self.take_failure() {
            return Err(Error::transient(format!(
                "broker unavailable for topic {}",
                message.topic
            )));
        }

        let partition = self.partition_for(&message.key);
        let mut topics = self.lock()?;
        let logs = topics
            .entry(message.topic.clone())
            .or_insert_with(|| self.new_topic());
        let log = &mut logs[partition];
        let offset = log.messages.len() as u64;
        log.messages.push(message);
        Ok(Delivered { partition, offset })
    }
}

#[async_trait]
impl Subscriber for InMemoryBroker {
    async fn assign(&self, topics: &[String]) -> Result<Vec<PartitionClaim>> {
        let mut known = self.lock()?;
        let mut claims = Vec::with_capacity(topics.len() * self.partitions);
        for topic in topics {
            known
                .entry(topic.clone())
                .or_insert_with(|| self.new_topic());
            claims.extend((0..self.partitions).map(|partition| PartitionClaim {
                topic: topic.clone(),
                partition,
            }));
        }
        Ok(claims)
    }

    async fn poll(&self, claim: &PartitionClaim, timeout: Duration) -> Result<Option<Delivery>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(delivery) = self.next_delivery(claim)? {
                return Ok(Some(delivery));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.with_partition(delivery, |log| {
            log.committed = log.committed.max(delivery.offset as usize + 1);
        })
    }

    async fn nack(&self, delivery: &Delivery, reason: &str) -> Result<()> {
        tracing::debug!(
            topic = %delivery.topic,
            partition = delivery.partition,
            offset = delivery.offset,
            reason,
            "rewinding partition for redelivery"
        );
        self.with_partition(delivery, |log| {
            log.cursor = log.cursor.min(delivery.offset as usize);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(topic: &str, key: &str, body: &str) -> BrokerMessage {
        BrokerMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            headers: Vec::new(),
            payload: body.as_bytes().to_vec(),
        }
    }

    async fn claim_for(broker: &InMemoryBroker, topic: &str, key: &str) -> PartitionClaim {
        let claims = broker.assign(&[topic.to_string()]).await.unwrap();
        let partition = broker.partition_for(key);
        claims
            .into_iter()
            .find(|claim| claim.partition == partition)
            .unwrap()
    }

    #[tokio::test]
    async fn same_key_same_partition_in_order() {
        let broker = InMemoryBroker::new(4);
        let first = broker.send(message("t", "a1", "one")).await.unwrap();
        let second = broker.send(message("t", "a1", "two")).await.unwrap();
        assert_eq!(first.partition, second.partition);
        assert_eq!(second.offset, first.offset + 1);
    }

    #[tokio::test]
    async fn assign_claims_every_partition() {
        let broker = InMemoryBroker::new(3);
        let claims = broker
            .assign(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(claims.len(), 6);
    }

    #[tokio::test]
    async fn poll_times_out_when_empty() {
        let broker = InMemoryBroker::new(1);
        let claim = claim_for(&broker, "t", "k").await;
        let polled = broker.poll(&claim, Duration::from_millis(5)).await.unwrap();
        assert!(polled.is_none());
    }

    #[tokio::test]
    async fn ack_commits_and_nack_redelivers() {
        let broker = InMemoryBroker::new(1);
        broker.send(message("t", "k", "one")).await.unwrap();
        broker.send(message("t", "k", "two")).await.unwrap();
        let claim = claim_for(&broker, "t", "k").await;
        let timeout = Duration::from_millis(5);

        let first = broker.poll(&claim, timeout).await.unwrap().unwrap();
        broker.nack(&first, "boom").await.unwrap();
        let again = broker.poll(&claim, timeout).await.unwrap().unwrap();
        assert_eq!(again.offset, first.offset);
        assert_eq!(broker.uncommitted("t").unwrap(), 2);

        broker.ack(&again).await.unwrap();
        let second = broker.poll(&claim, timeout).await.unwrap().unwrap();
        assert_eq!(second.payload, b"two".to_vec());
        broker.ack(&second).await.unwrap();
        assert_eq!(broker.uncommitted("t").unwrap(), 0);
    }

    #[tokio::test]
    async fn injected_failures_are_transient_and_run_out() {
        let broker = InMemoryBroker::new(1);
        broker.fail_next_sends(1);

        let err = broker.send(message("t", "k", "one")).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(broker.messages("t").unwrap().is_empty());

        broker.send(message("t", "k", "one")).await.unwrap();
        assert_eq!(broker.messages("t").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_partition_is_not_found() {
        let broker = InMemoryBroker::new(1);
        let claim = PartitionClaim {
            topic: "missing".to_string(),
            partition: 0,
        };
        let err = broker
            .poll(&claim, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }
}
