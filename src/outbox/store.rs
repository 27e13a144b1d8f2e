//! Durable, ordered holding area for events awaiting publication.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use super::record::{OutboxRecord, OutboxStatus};
use crate::broker::Headers;
use crate::error::{Error, Result};

#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Append a `pending` record and return its id.
    async fn enqueue(&self, topic: &str, payload: Vec<u8>, headers: Headers) -> Result<Uuid>;

    /// Claim up to `limit` of the oldest `pending` records, flipping them to
    /// `processing` in the same step. A claimed record is never returned
    /// again, whoever asks.
    async fn dequeue_batch(&self, limit: usize) -> Result<Vec<OutboxRecord>>;

    async fn mark_dispatched(&self, id: Uuid) -> Result<()>;
}

/// Vec-backed store. Records are kept in insertion order and never deleted.
///
/// Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct InMemoryOutboxStore {
    records: Arc<RwLock<Vec<OutboxRecord>>>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record in insertion order.
    pub fn records(&self) -> Result<Vec<OutboxRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| Error::LockPoisoned("outbox read"))?;
        Ok(records.clone())
    }

    pub fn count_by_status(&self, status: OutboxStatus) -> Result<usize> {
        let records = self
            .records
            .read()
            .map_err(|_| Error::LockPoisoned("outbox read"))?;
        Ok(records.iter().filter(|r| r.status == status).count())
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn enqueue(&self, topic: &str, payload: Vec<u8>, headers: Headers) -> Result<Uuid> {
        let record = OutboxRecord::pending(topic, payload, headers);
        let id = record.id;
        self.records
            .write()
            .map_err(|_| Error::LockPoisoned("outbox write"))?
            .push(record);
        Ok(id)
    }

    async fn dequeue_batch(&self, limit: usize) -> Result<Vec<OutboxRecord>> {
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::LockPoisoned("outbox write"))?;

        let claimed = records
            .iter_mut()
            .filter(|r| r.status == OutboxStatus::Pending)
            .take(limit)
            .map(|record| {
                record.transition(OutboxStatus::Processing);
                record.clone()
            })
            .collect();
        Ok(claimed)
    }

    async fn mark_dispatched(&self, id: Uuid) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::LockPoisoned("outbox write"))?;

        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::not_found("outbox record", id.to_string()))?;
        record.transition(OutboxStatus::Dispatched);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with(count: usize) -> (InMemoryOutboxStore, Vec<Uuid>) {
        let store = InMemoryOutboxStore::new();
        let mut ids = Vec::new();
        for n in 0..count {
            ids.push(
                store
                    .enqueue("t", format!("payload-{}", n).into_bytes(), Vec::new())
                    .await
                    .unwrap(),
            );
        }
        (store, ids)
    }

    #[tokio::test]
    async fn dequeue_claims_oldest_in_order() {
        let (store, ids) = store_with(3).await;

        let batch = store.dequeue_batch(2).await.unwrap();
        assert_eq!(batch.iter().map(|r| r.id).collect::<Vec<_>>(), ids[..2].to_vec());
        assert!(batch.iter().all(|r| r.status == OutboxStatus::Processing));
        assert_eq!(store.count_by_status(OutboxStatus::Processing).unwrap(), 2);
    }

    #[tokio::test]
    async fn claimed_records_are_not_returned_again() {
        let (store, ids) = store_with(3).await;
        store.dequeue_batch(2).await.unwrap();

        let second = store.dequeue_batch(2).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, ids[2]);
        assert!(store.dequeue_batch(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_dequeues_never_share_records() {
        let (store, _) = store_with(50).await;

        let mut tasks = Vec::new();
        for _ in 0..5 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move { store.dequeue_batch(7).await.unwrap() }));
        }

        let mut seen = std::collections::HashSet::new();
        for task in tasks {
            for record in task.await.unwrap() {
                assert!(seen.insert(record.id));
            }
        }
        assert_eq!(seen.len(), 35);
    }

    #[tokio::test]
    async fn mark_dispatched_is_terminal() {
        let (store, ids) = store_with(1).await;
        store.dequeue_batch(1).await.unwrap();
        store.mark_dispatched(ids[0]).await.unwrap();

        assert_eq!(store.count_by_status(OutboxStatus::Dispatched).unwrap(), 1);
        assert!(store.dequeue_batch(10).await.unwrap().is_empty());
        assert_eq!(store.records().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mark_dispatched_unknown_id() {
        let store = InMemoryOutboxStore::new();
        let err = store.mark_dispatched(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
