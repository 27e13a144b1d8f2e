//! Background task draining the outbox into the broker.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::record::OutboxRecord;
use super::store::OutboxStore;
use crate::broker::EventProducer;
use crate::config::DispatcherConfig;
use crate::error::Result;
use crate::event::Event;

/// Outcome of one drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub claimed: usize,
    pub dispatched: usize,
    /// Claimed records left in `processing` after a parse or send failure.
    pub failed: usize,
}

/// Counters accumulated over the dispatcher's lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherStats {
    pub polls: u64,
    pub records_dispatched: u64,
    pub records_failed: u64,
}

#[derive(Default)]
struct Counters {
    polls: AtomicU64,
    dispatched: AtomicU64,
    failed: AtomicU64,
}

/// Periodically claims a batch of pending records, sends each through the
/// [`EventProducer`] and marks it dispatched.
///
/// A record that fails to parse or send stays `processing`; nothing reclaims
/// it. `start` spawns the loop at most once; `stop` may be called any number
/// of times.
///
/// ```ignore
/// let dispatcher = Arc::new(OutboxDispatcher::new(store, producer, DispatcherConfig::default())?);
/// dispatcher.start();
/// // ...
/// let stats = dispatcher.stop().await;
/// ```
pub struct OutboxDispatcher {
    store: Arc<dyn OutboxStore>,
    producer: EventProducer,
    config: DispatcherConfig,
    shutdown: CancellationToken,
    started: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
    counters: Counters,
}

impl OutboxDispatcher {
    /// Fails when the interval or batch size is zero.
    pub fn new(
        store: Arc<dyn OutboxStore>,
        producer: EventProducer,
        config: DispatcherConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            producer,
            config,
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
            handle: Mutex::new(None),
            counters: Counters::default(),
        })
    }

    /// Stop together with `token`. Pass a child token to share a parent
    /// shutdown signal without letting `stop` cancel siblings.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Spawn the drain loop. Returns `false` if it was already started.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("outbox dispatcher already started");
            return false;
        }

        let handle = tokio::spawn(Arc::clone(self).run());
        match self.handle.lock() {
            Ok(mut slot) => *slot = Some(handle),
            Err(poisoned) => *poisoned.into_inner() = Some(handle),
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.shutdown.is_cancelled()
    }

    /// Cancel the loop and wait for it to finish its current batch. Later
    /// calls return immediately.
    pub async fn stop(&self) -> DispatcherStats {
        self.shutdown.cancel();

        let handle = match self.handle.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "outbox dispatcher task ended abnormally");
            }
        }
        self.stats()
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            polls: self.counters.polls.load(Ordering::Relaxed),
            records_dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            records_failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            interval_ms = self.config.interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "outbox dispatcher started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.dispatch_once().await {
                        tracing::error!(error = %err, "outbox dequeue failed");
                    }
                }
            }
        }

        tracing::info!(
            records_dispatched = self.counters.dispatched.load(Ordering::Relaxed),
            records_failed = self.counters.failed.load(Ordering::Relaxed),
            "outbox dispatcher stopped"
        );
    }

    /// Run one drain pass. Only a failed dequeue is returned as an error;
    /// per-record failures are logged and counted.
    pub async fn dispatch_once(&self) -> Result<DispatchReport> {
        self.counters.polls.fetch_add(1, Ordering::Relaxed);
        let records = self.store.dequeue_batch(self.config.batch_size).await?;

        let mut report = DispatchReport {
            claimed: records.len(),
            ..DispatchReport::default()
        };
        for record in &records {
            match self.dispatch_record(record).await {
                Ok(()) => report.dispatched += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(
                        record_id = %record.id,
                        topic = %record.topic,
                        error = %err,
                        "outbox record not dispatched, left in processing"
                    );
                }
            }
        }

        self.counters
            .dispatched
            .fetch_add(report.dispatched as u64, Ordering::Relaxed);
        self.counters
            .failed
            .fetch_add(report.failed as u64, Ordering::Relaxed);
        if report.claimed > 0 {
            tracing::debug!(
                claimed = report.claimed,
                dispatched = report.dispatched,
                failed = report.failed,
                "outbox batch drained"
            );
        }
        Ok(report)
    }

    async fn dispatch_record(&self, record: &OutboxRecord) -> Result<()> {
        let event = Event::from_slice(&record.payload)?;
        self.producer
            .send_event_with_headers(&record.topic, event, record.headers.clone())
            .await?;
        self.store.mark_dispatched(record.id).await
    }
}
