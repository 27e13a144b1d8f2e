//! Binds inbound topics to handlers and runs one receive loop per partition.
//!
//! Within a partition, messages are handled one at a time and acknowledged
//! before the next poll, so a slow handler only holds back its own partition.
//! A handler error that can succeed on retry leaves the message unacked for
//! redelivery; a validation error acks and drops it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broker::{Delivery, PartitionClaim, Subscriber};
use crate::config::ConsumerConfig;
use crate::error::{Error, Result};
use crate::event::{Event, InboundTopic};
use crate::handlers::EventHandlers;

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Handled successfully; acked.
    Handled,
    /// Not decodable or failed validation; acked and dropped.
    Dropped,
    /// Retryable failure; nacked for redelivery.
    Retry,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    pub handled: u64,
    pub dropped: u64,
    pub retried: u64,
    pub poll_errors: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    handled: AtomicU64,
    dropped: AtomicU64,
    retried: AtomicU64,
    poll_errors: AtomicU64,
}

pub struct Consumer {
    subscriber: Arc<dyn Subscriber>,
    handlers: EventHandlers,
    config: ConsumerConfig,
    topics: Vec<InboundTopic>,
    shutdown: CancellationToken,
    started: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Counters,
}

impl Consumer {
    /// Fails when a configured topic has no handler or appears twice.
    pub fn new(
        subscriber: Arc<dyn Subscriber>,
        handlers: EventHandlers,
        config: ConsumerConfig,
    ) -> Result<Self> {
        let topics = config.inbound_topics()?;
        Ok(Self {
            subscriber,
            handlers,
            config,
            topics,
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
            counters: Counters::default(),
        })
    }

    /// Stop together with `token`.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Inbound topics bound to handlers, in configured order.
    pub fn topics(&self) -> &[InboundTopic] {
        &self.topics
    }

    /// Claim partitions and spawn a receive loop for each. Returns the number
    /// of loops started.
    pub async fn start(self: &Arc<Self>) -> Result<usize> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::config("consumer already started"));
        }

        let names: Vec<String> = self.topics.iter().map(|t| t.as_str().to_string()).collect();
        let routed = match self.claim_partitions(&names).await {
            Ok(routed) => routed,
            Err(err) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };

        let spawned: Vec<JoinHandle<()>> = routed
            .into_iter()
            .map(|(claim, topic)| tokio::spawn(Arc::clone(self).run_partition(claim, topic)))
            .collect();
        let count = spawned.len();
        match self.workers.lock() {
            Ok(mut workers) => workers.extend(spawned),
            Err(poisoned) => poisoned.into_inner().extend(spawned),
        }

        tracing::info!(
            group_id = %self.config.group_id,
            topics = ?names,
            partitions = count,
            "consumer started"
        );
        Ok(count)
    }

    /// Join the group and pair every assigned partition with its handler topic.
    async fn claim_partitions(
        &self,
        names: &[String],
    ) -> Result<Vec<(PartitionClaim, InboundTopic)>> {
        let claims = self.subscriber.assign(names).await?;

        let mut routed = Vec::with_capacity(claims.len());
        for claim in claims {
            let topic = InboundTopic::parse(&claim.topic)
                .filter(|topic| self.topics.contains(topic))
                .ok_or_else(|| {
                    Error::config(format!("assigned topic {} has no handler", claim.topic))
                })?;
            routed.push((claim, topic));
        }
        Ok(routed)
    }

    /// Cancel polling and wait for every loop to finish the message it is
    /// handling. Later calls return immediately.
    pub async fn stop(&self) -> ConsumerStats {
        self.shutdown.cancel();

        let workers = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for worker in workers {
            if let Err(err) = worker.await {
                tracing::error!(error = %err, "consumer worker ended abnormally");
            }
        }
        self.stats()
    }

    /// Counters so far; safe to call while running.
    pub fn stats(&self) -> ConsumerStats {
        ConsumerStats {
            received: self.counters.received.load(Ordering::Relaxed),
            handled: self.counters.handled.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
            poll_errors: self.counters.poll_errors.load(Ordering::Relaxed),
        }
    }

    async fn run_partition(self: Arc<Self>, claim: PartitionClaim, topic: InboundTopic) {
        tracing::debug!(
            topic = %claim.topic,
            partition = claim.partition,
            "partition loop started"
        );

        loop {
            let polled = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                polled = self.subscriber.poll(&claim, self.config.poll_timeout) => polled,
            };

            let delivery = match polled {
                Ok(Some(delivery)) => delivery,
                Ok(None) => continue,
                Err(err) => {
                    self.counters.poll_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        topic = %claim.topic,
                        partition = claim.partition,
                        error = %err,
                        "poll failed"
                    );
                    if !self.backoff(self.config.retry_backoff).await {
                        break;
                    }
                    continue;
                }
            };

            match self.handle_delivery(topic, &delivery).await {
                DeliveryOutcome::Handled | DeliveryOutcome::Dropped => {
                    if let Err(err) = self.subscriber.ack(&delivery).await {
                        tracing::error!(
                            topic = %delivery.topic,
                            partition = delivery.partition,
                            offset = delivery.offset,
                            error = %err,
                            "ack failed"
                        );
                    }
                }
                DeliveryOutcome::Retry => {
                    if let Err(err) = self.subscriber.nack(&delivery, "handler failed").await {
                        tracing::error!(
                            topic = %delivery.topic,
                            partition = delivery.partition,
                            offset = delivery.offset,
                            error = %err,
                            "nack failed"
                        );
                    }
                    if !self.backoff(self.config.retry_backoff).await {
                        break;
                    }
                }
            }
        }

        tracing::debug!(
            topic = %claim.topic,
            partition = claim.partition,
            "partition loop stopped"
        );
    }

    /// Sleep unless shut down first. Returns `false` on shutdown.
    async fn backoff(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Decode and handle one delivery without acknowledging it.
    pub async fn handle_delivery(
        &self,
        topic: InboundTopic,
        delivery: &Delivery,
    ) -> DeliveryOutcome {
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        let event = match Event::from_slice(&delivery.payload) {
            Ok(event) => event,
            Err(err) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    topic = %delivery.topic,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    error = %err,
                    "dropping undecodable message"
                );
                return DeliveryOutcome::Dropped;
            }
        };

        let result = self.handlers.dispatch(topic, &event).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                self.counters.handled.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    topic = %delivery.topic,
                    event_id = %event.id,
                    event_type = %event.event_type,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    duration_ms,
                    "event handled"
                );
                DeliveryOutcome::Handled
            }
            Err(err) if !err.is_retryable() => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    topic = %delivery.topic,
                    event_id = %event.id,
                    event_type = %event.event_type,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    duration_ms,
                    error = %err,
                    "dropping event that failed validation"
                );
                DeliveryOutcome::Dropped
            }
            Err(err) => {
                self.counters.retried.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    topic = %delivery.topic,
                    event_id = %event.id,
                    event_type = %event.event_type,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    duration_ms,
                    kind = ?err.kind(),
                    error = %err,
                    "handler failed, leaving message for redelivery"
                );
                DeliveryOutcome::Retry
            }
        }
    }
}
