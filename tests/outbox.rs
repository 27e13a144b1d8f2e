//! Outbox store, publisher and dispatcher working together.

mod support;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use media_pipeline::broker::EventProducer;
use media_pipeline::config::DispatcherConfig;
use media_pipeline::event::event_types;
use media_pipeline::outbox::{
    EventPublisher, InMemoryOutboxStore, OutboxDispatcher, OutboxPublisher, OutboxStatus,
    OutboxStore,
};
use media_pipeline::{Event, InMemoryBroker};
use serde_json::json;
use support::eventually;

const TOPIC: &str = "media.status.changed";

fn status_event(asset_id: &str) -> Event {
    Event::new(
        event_types::VIDEO_STATUS_CHANGED,
        json!({ "assetId": asset_id, "videoId": "v1", "format": "hls", "status": "ready" }),
    )
}

fn outbox_publisher(broker: &InMemoryBroker, store: &InMemoryOutboxStore) -> OutboxPublisher {
    OutboxPublisher::direct(support::producer(broker)).with_store(Arc::new(store.clone()))
}

fn dispatcher(
    broker: &InMemoryBroker,
    store: &InMemoryOutboxStore,
    config: DispatcherConfig,
) -> Arc<OutboxDispatcher> {
    Arc::new(
        OutboxDispatcher::new(Arc::new(store.clone()), support::producer(broker), config).unwrap(),
    )
}

#[tokio::test]
async fn concurrent_dispatchers_never_send_a_record_twice() {
    let broker = InMemoryBroker::new(4);
    let store = InMemoryOutboxStore::new();
    let publisher = outbox_publisher(&broker, &store);
    for n in 0..40 {
        publisher
            .publish(TOPIC, status_event(&format!("a{}", n)))
            .await
            .unwrap();
    }

    let config = DispatcherConfig::default().with_batch_size(3);
    let first = dispatcher(&broker, &store, config.clone());
    let second = dispatcher(&broker, &store, config);

    let mut tasks = Vec::new();
    for d in [first, second] {
        tasks.push(tokio::spawn(async move {
            let mut sent = 0;
            loop {
                let report = d.dispatch_once().await.unwrap();
                if report.claimed == 0 {
                    return sent;
                }
                sent += report.dispatched;
            }
        }));
    }
    let mut total = 0;
    for task in tasks {
        total += task.await.unwrap();
    }

    assert_eq!(total, 40);
    let events = broker.events(TOPIC).unwrap();
    let ids: HashSet<_> = events.iter().map(|e| e.id.clone()).collect();
    assert_eq!(events.len(), 40);
    assert_eq!(ids.len(), 40);
    assert_eq!(store.count_by_status(OutboxStatus::Dispatched).unwrap(), 40);
}

#[tokio::test]
async fn dispatched_event_keeps_its_envelope() {
    let broker = InMemoryBroker::new(1);
    let store = InMemoryOutboxStore::new();
    let event = status_event("a1")
        .with_correlation_id("job-abc")
        .with_causation_id("evt-1");
    let id = event.id.clone();

    outbox_publisher(&broker, &store).publish(TOPIC, event).await.unwrap();
    let report = dispatcher(&broker, &store, DispatcherConfig::default())
        .dispatch_once()
        .await
        .unwrap();
    assert_eq!(report.dispatched, 1);

    let sent = broker.events(TOPIC).unwrap();
    assert_eq!(sent[0].id, id);
    assert_eq!(sent[0].source, support::SOURCE);
    assert_eq!(sent[0].correlation_id.as_deref(), Some("job-abc"));
    assert_eq!(sent[0].causation_id.as_deref(), Some("evt-1"));
    assert_eq!(broker.messages(TOPIC).unwrap()[0].key, "a1");
}

#[tokio::test]
async fn failed_send_leaves_record_processing() {
    let broker = InMemoryBroker::new(1);
    let store = InMemoryOutboxStore::new();
    outbox_publisher(&broker, &store)
        .publish(TOPIC, status_event("a1"))
        .await
        .unwrap();

    broker.fail_next_sends(1);
    let d = dispatcher(&broker, &store, DispatcherConfig::default());
    let report = d.dispatch_once().await.unwrap();

    assert_eq!((report.claimed, report.dispatched, report.failed), (1, 0, 1));
    assert_eq!(store.count_by_status(OutboxStatus::Processing).unwrap(), 1);
    assert!(broker.events(TOPIC).unwrap().is_empty());
    assert_eq!(d.dispatch_once().await.unwrap().claimed, 0);
    assert_eq!(d.stats().records_failed, 1);
}

#[tokio::test]
async fn background_loop_drains_and_stops_once() {
    let broker = InMemoryBroker::new(2);
    let store = InMemoryOutboxStore::new();
    let d = dispatcher(
        &broker,
        &store,
        DispatcherConfig::default().with_interval(Duration::from_millis(10)),
    );
    assert!(d.start());
    assert!(!d.start());
    assert!(d.is_running());

    let publisher = outbox_publisher(&broker, &store);
    for n in 0..5 {
        publisher
            .publish(TOPIC, status_event(&format!("a{}", n)))
            .await
            .unwrap();
    }

    let drained = eventually(Duration::from_secs(2), || {
        let store = store.clone();
        async move { store.count_by_status(OutboxStatus::Dispatched).unwrap() == 5 }
    })
    .await;
    assert!(drained);

    let first = d.stop().await;
    let second = d.stop().await;
    assert!(!d.is_running());
    assert_eq!(first.records_dispatched, 5);
    assert_eq!(first, second);
}

#[tokio::test]
async fn publisher_without_store_sends_directly() {
    let broker = InMemoryBroker::new(1);
    let publisher = OutboxPublisher::direct(EventProducer::new(Arc::new(broker.clone()), "direct"));
    assert!(!publisher.uses_outbox());

    publisher.publish(TOPIC, status_event("a1")).await.unwrap();

    let sent = broker.events(TOPIC).unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].source, "direct");
}

#[tokio::test]
async fn store_claims_oldest_first() {
    let store = InMemoryOutboxStore::new();
    let mut ids = Vec::new();
    for n in 0..3 {
        ids.push(
            store
                .enqueue(TOPIC, format!("{{\"n\":{}}}", n).into_bytes(), Vec::new())
                .await
                .unwrap(),
        );
    }

    let first = store.dequeue_batch(2).await.unwrap();
    assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), ids[..2].to_vec());
    let rest = store.dequeue_batch(10).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].id, ids[2]);
    assert!(store.dequeue_batch(10).await.unwrap().is_empty());
}
