use std::sync::atomic::AtomicBool;
use std::time::Duration;

use serde_json::{json, Value};
use widget_sync_service::adapters::memory::{MemoryObjectStore, MemoryQueue, MemoryTableStore};
use widget_sync_service::handlers::intake::handle_intake_event;
use widget_sync_service::handlers::poll::{run_poll_loop, PollConfig, PollSummary, StopReason};
use widget_sync_service::handlers::processor::WidgetStores;
use widget_sync_service::handlers::source::{
    BucketRequestSource, QueueRequestSource, RequestSource,
};

struct Harness {
    objects: MemoryObjectStore,
    table: MemoryTableStore,
}

impl Harness {
    fn new() -> Self {
        Self {
            objects: MemoryObjectStore::new(),
            table: MemoryTableStore::new("id"),
        }
    }

    fn drain(&self, source: &mut dyn RequestSource) -> PollSummary {
        let config = PollConfig {
            idle_interval: Duration::ZERO,
            ..PollConfig::default()
        };
        run_poll_loop(
            source,
            WidgetStores {
                objects: &self.objects,
                table: &self.table,
            },
            &config,
            &AtomicBool::new(false),
        )
        .expect("poll loop should finish")
    }
}

fn jane_doe_create() -> Value {
    json!({
        "type": "create",
        "requestId": "r-1",
        "widgetId": "w1",
        "owner": "Jane Doe",
        "label": "L",
        "otherAttributes": [{"name": "color", "value": "red"}],
    })
}

fn assert_jane_doe_widget(harness: &Harness) {
    let object = harness
        .objects
        .json("widgets/jane-doe/w1")
        .expect("widget object should exist");
    assert_eq!(object["id"], json!("w1"));
    assert_eq!(object["widgetId"], json!("w1"));
    assert_eq!(object["owner"], json!("Jane Doe"));
    assert_eq!(object["label"], json!("L"));
    assert_eq!(object["color"], json!("red"));
    assert!(object.get("otherAttributes").is_none());
    assert!(object.get("type").is_none());

    let item = harness.table.item("w1").expect("table item should exist");
    assert_eq!(item["id"], json!("w1"));
    assert_eq!(item["widgetId"], json!("w1"));
    assert_eq!(item["color"], json!("red"));
}

#[test]
fn queued_create_lands_in_both_stores() {
    let harness = Harness::new();
    let queue = MemoryQueue::new("widget-requests");
    queue.push(&jane_doe_create().to_string());
    let mut source = QueueRequestSource::with_batch(&queue, 10, Duration::ZERO);

    let summary = harness.drain(&mut source);

    assert_eq!(summary.consumed, 1);
    assert_eq!(summary.applied, 1);
    assert_eq!(summary.stop_reason, StopReason::Drained);
    assert_eq!(queue.in_flight_count(), 0);
    assert_jane_doe_widget(&harness);
}

#[test]
fn bucket_create_lands_in_both_stores() {
    let harness = Harness::new();
    let requests = MemoryObjectStore::new();
    requests.seed_object("1612306368338", jane_doe_create().to_string().as_bytes());
    let mut source = BucketRequestSource::new(&requests);

    let summary = harness.drain(&mut source);

    assert_eq!(summary.consumed, 1);
    assert!(requests.keys().is_empty());
    assert_jane_doe_widget(&harness);
}

#[test]
fn intake_then_consumer_round_trip() {
    let harness = Harness::new();
    let queue = MemoryQueue::new("widget-requests");
    let mut submission = jane_doe_create();
    submission["queueName"] = json!("widget-requests");

    let response = handle_intake_event(json!({"body": submission.to_string()}), &queue);
    assert_eq!(response.status_code, 200);

    let mut source = QueueRequestSource::with_batch(&queue, 10, Duration::ZERO);
    harness.drain(&mut source);

    assert_jane_doe_widget(&harness);
    assert!(harness
        .objects
        .json("widgets/jane-doe/w1")
        .is_some_and(|object| object.get("queueName").is_none()));
}

#[test]
fn create_update_delete_lifecycle() {
    let harness = Harness::new();
    let requests = MemoryObjectStore::new();
    requests.seed_object("0001", jane_doe_create().to_string().as_bytes());
    requests.seed_object(
        "0002",
        json!({
            "type": "update",
            "requestId": "r-2",
            "widgetId": "w1",
            "description": "painted",
            "otherAttributes": [
                {"name": "color", "value": "blue"},
                {"name": "size", "value": "L"},
            ],
        })
        .to_string()
        .as_bytes(),
    );
    let mut source = BucketRequestSource::new(&requests);
    harness.drain(&mut source);

    let object = harness
        .objects
        .json("widgets/jane-doe/w1")
        .expect("widget object should exist");
    assert_eq!(object["owner"], json!("Jane Doe"));
    assert_eq!(object["label"], json!("L"));
    assert_eq!(object["description"], json!("painted"));
    assert_eq!(object["color"], json!("blue"));
    assert_eq!(object["size"], json!("L"));
    assert_eq!(object["requestId"], json!("r-2"));
    assert_eq!(
        harness.table.item("w1").expect("item should exist")["color"],
        json!("blue")
    );

    requests.seed_object(
        "0003",
        json!({"type": "delete", "widgetId": "w1", "owner": "Jane Doe"})
            .to_string()
            .as_bytes(),
    );
    let mut source = BucketRequestSource::new(&requests);
    let summary = harness.drain(&mut source);

    assert_eq!(summary.applied, 1);
    assert!(harness.table.is_empty());
    assert!(harness.objects.keys().is_empty());
}

#[test]
fn owner_change_writes_under_new_key() {
    let harness = Harness::new();
    let queue = MemoryQueue::new("widget-requests");
    queue.push(&jane_doe_create().to_string());
    queue.push(
        &json!({"type": "update", "widgetId": "w1", "owner": "John Roe"}).to_string(),
    );
    let mut source = QueueRequestSource::with_batch(&queue, 10, Duration::ZERO);

    harness.drain(&mut source);

    assert_eq!(
        harness.objects.keys(),
        vec!["widgets/jane-doe/w1", "widgets/john-roe/w1"]
    );
    assert_eq!(
        harness.table.item("w1").expect("item should exist")["owner"],
        json!("John Roe")
    );
}

#[test]
fn mixed_batch_consumes_everything() {
    let harness = Harness::new();
    let queue = MemoryQueue::new("widget-requests");
    queue.push("not json at all");
    queue.push(&json!({"type": "archive", "widgetId": "w9"}).to_string());
    queue.push(&json!({"type": "update", "widgetId": "missing"}).to_string());
    queue.push(&json!({"type": "delete", "widgetId": "ghost"}).to_string());
    queue.push(&jane_doe_create().to_string());
    let mut source = QueueRequestSource::with_batch(&queue, 10, Duration::ZERO);

    let summary = harness.drain(&mut source);

    assert_eq!(summary.consumed, 5);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.ignored, 1);
    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.applied, 2);
    assert_eq!(queue.in_flight_count(), 0);
    assert!(queue.visible_bodies().is_empty());
    assert_eq!(harness.table.len(), 1);
}

#[test]
fn empty_queue_stops_after_ten_receives() {
    let harness = Harness::new();
    let queue = MemoryQueue::new("widget-requests");
    let mut source = QueueRequestSource::with_batch(&queue, 10, Duration::ZERO);

    let summary = harness.drain(&mut source);

    assert_eq!(summary.consumed, 0);
    assert_eq!(summary.stop_reason, StopReason::Drained);
    assert_eq!(queue.receive_calls(), 10);
}
