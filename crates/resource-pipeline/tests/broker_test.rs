mod common;

use common::{widget, Widget};
use resource_pipeline::StreamBroker;
use std::sync::Arc;
use std::time::Duration;

fn execution(id: &str, observed: u32) -> Widget {
    let mut w = widget("run");
    w.metadata.id = id.to_string();
    w.status.observed = observed;
    w
}

#[test]
fn test_broadcast_without_subscribers_is_a_no_op() {
    let broker: StreamBroker<Widget> = StreamBroker::new();
    assert_eq!(broker.broadcast(&execution("wex-1", 1)), 0);
    assert_eq!(broker.subscriber_count("wex-1"), 0);
}

#[tokio::test]
async fn test_each_subscriber_gets_its_own_copy() {
    let broker: StreamBroker<Widget> = StreamBroker::new();
    let mut first = broker.subscribe("wex-1");
    let mut second = broker.subscribe("wex-1");
    let mut other = broker.subscribe("wex-2");
    assert_ne!(first.id(), second.id());

    assert_eq!(broker.broadcast(&execution("wex-1", 7)), 2);

    assert_eq!(first.recv().await.unwrap().status.observed, 7);
    assert_eq!(second.recv().await.unwrap().status.observed, 7);
    assert!(other.try_recv().is_none());
}

#[tokio::test]
async fn test_updates_arrive_in_broadcast_order() {
    let broker: StreamBroker<Widget> = StreamBroker::new();
    let mut sub = broker.subscribe("wex-1");
    for n in 1..=5 {
        broker.broadcast(&execution("wex-1", n));
    }
    let mut seen = Vec::new();
    while let Some(update) = sub.try_recv() {
        seen.push(update.status.observed);
    }
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_full_queue_drops_without_blocking() {
    // Scenario: 101 updates against a consumer that never reads.
    let broker: StreamBroker<Widget> = StreamBroker::new();
    let mut slow = broker.subscribe("wex-1");
    let mut fast = broker.subscribe("wex-1");

    let mut fast_seen = 0;
    let broadcasting = async {
        for n in 1..=101 {
            broker.broadcast(&execution("wex-1", n));
            if fast.try_recv().is_some() {
                fast_seen += 1;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(1), broadcasting)
        .await
        .expect("broadcast must not wait on a slow subscriber");

    assert_eq!(fast_seen, 101);

    let mut buffered = Vec::new();
    while let Some(update) = slow.try_recv() {
        buffered.push(update.status.observed);
    }
    assert_eq!(buffered.len(), StreamBroker::<Widget>::DEFAULT_CAPACITY);
    assert_eq!(buffered.first(), Some(&1));
    assert_eq!(buffered.last(), Some(&100));
}

#[tokio::test]
async fn test_custom_capacity() {
    let broker: StreamBroker<Widget> = StreamBroker::with_capacity(2);
    let mut sub = broker.subscribe("wex-1");
    assert_eq!(broker.broadcast(&execution("wex-1", 1)), 1);
    assert_eq!(broker.broadcast(&execution("wex-1", 2)), 1);
    assert_eq!(broker.broadcast(&execution("wex-1", 3)), 0);
    assert_eq!(sub.try_recv().unwrap().status.observed, 1);

    // zero is raised to one
    assert_eq!(StreamBroker::<Widget>::with_capacity(0).capacity(), 1);
}

#[tokio::test]
async fn test_unsubscribe_closes_queue_and_is_idempotent() {
    let broker: StreamBroker<Widget> = StreamBroker::new();
    let mut sub = broker.subscribe("wex-1");
    broker.broadcast(&execution("wex-1", 1));

    assert!(broker.unsubscribe("wex-1", sub.id()));
    assert!(!broker.unsubscribe("wex-1", sub.id()));
    assert!(!broker.unsubscribe("wex-unknown", sub.id()));
    assert_eq!(broker.subscriber_count("wex-1"), 0);

    // buffered updates drain, then the stream ends
    assert_eq!(sub.recv().await.unwrap().status.observed, 1);
    assert!(sub.recv().await.is_none());
    assert_eq!(broker.broadcast(&execution("wex-1", 2)), 0);
}

#[tokio::test]
async fn test_dropped_subscription_is_pruned_on_broadcast() {
    let broker: StreamBroker<Widget> = StreamBroker::new();
    let dropped = broker.subscribe("wex-1");
    let mut kept = broker.subscribe("wex-1");
    drop(dropped);
    assert_eq!(broker.subscriber_count("wex-1"), 2);

    assert_eq!(broker.broadcast(&execution("wex-1", 1)), 1);
    assert_eq!(broker.subscriber_count("wex-1"), 1);
    assert!(kept.try_recv().is_some());
}

#[tokio::test]
async fn test_concurrent_subscribe_and_broadcast() {
    let broker: Arc<StreamBroker<Widget>> = Arc::new(StreamBroker::new());
    let mut tasks = Vec::new();
    for n in 0..8u32 {
        let broker = broker.clone();
        tasks.push(tokio::spawn(async move {
            let sub = broker.subscribe("wex-1");
            broker.broadcast(&execution("wex-1", n));
            broker.unsubscribe("wex-1", sub.id())
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap());
    }
    assert_eq!(broker.subscriber_count("wex-1"), 0);
}
