//! In-memory port implementations for tests and local runs.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;

use super::object_store::ObjectStore;
use super::queue::{QueueMessage, QueueSink, QueueSource};
use super::table_store::{Item, TableStore};
use super::StoreError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_object(&self, key: &str, body: &[u8]) {
        lock(&self.objects).insert(key.to_string(), body.to_vec());
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    pub fn body(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.objects).get(key).cloned()
    }

    pub fn json(&self, key: &str) -> Option<Value> {
        self.body(key)
            .and_then(|body| serde_json::from_slice(&body).ok())
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put_object(&self, key: &str, body: &[u8]) -> Result<(), StoreError> {
        lock(&self.objects).insert(key.to_string(), body.to_vec());
        Ok(())
    }

    fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(lock(&self.objects).get(key).cloned())
    }

    fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.objects).remove(key);
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(lock(&self.objects)
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[derive(Debug)]
pub struct MemoryTableStore {
    key_attribute: String,
    items: Mutex<BTreeMap<String, Item>>,
}

impl MemoryTableStore {
    pub fn new(key_attribute: impl Into<String>) -> Self {
        Self {
            key_attribute: key_attribute.into(),
            items: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn item(&self, key: &str) -> Option<Item> {
        lock(&self.items).get(key).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.items).is_empty()
    }
}

impl TableStore for MemoryTableStore {
    fn key_attribute(&self) -> &str {
        &self.key_attribute
    }

    fn get_item(&self, key: &str) -> Result<Option<Item>, StoreError> {
        Ok(self.item(key))
    }

    fn put_item(&self, item: &Item) -> Result<(), StoreError> {
        let key = item
            .get(&self.key_attribute)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StoreError::invalid_item(
                    "memory-table",
                    format!("missing string key attribute '{}'", self.key_attribute),
                )
            })?;
        lock(&self.items).insert(key.to_string(), item.clone());
        Ok(())
    }

    fn delete_item(&self, key: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.items).remove(key).is_some())
    }
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    visible: VecDeque<QueueMessage>,
    in_flight: HashMap<String, QueueMessage>,
    receive_calls: usize,
}

/// Single named queue. Received messages stay in flight until deleted.
#[derive(Debug)]
pub struct MemoryQueue {
    name: String,
    state: Mutex<QueueState>,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn push(&self, body: &str) -> String {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let message = QueueMessage {
            message_id: format!("msg-{}", state.next_id),
            receipt_handle: format!("receipt-{}", state.next_id),
            body: body.to_string(),
        };
        let message_id = message.message_id.clone();
        state.visible.push_back(message);
        message_id
    }

    pub fn visible_bodies(&self) -> Vec<String> {
        lock(&self.state)
            .visible
            .iter()
            .map(|message| message.body.clone())
            .collect()
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.state).in_flight.len()
    }

    pub fn receive_calls(&self) -> usize {
        lock(&self.state).receive_calls
    }
}

impl QueueSource for MemoryQueue {
    fn receive_messages(
        &self,
        max_messages: i32,
        _wait: Duration,
    ) -> Result<Vec<QueueMessage>, StoreError> {
        let mut state = lock(&self.state);
        state.receive_calls += 1;
        let count = usize::try_from(max_messages.max(0))
            .unwrap_or_default()
            .min(state.visible.len());
        let batch: Vec<QueueMessage> = state.visible.drain(..count).collect();
        for message in &batch {
            state
                .in_flight
                .insert(message.receipt_handle.clone(), message.clone());
        }
        Ok(batch)
    }

    fn delete_message(&self, receipt_handle: &str) -> Result<(), StoreError> {
        lock(&self.state).in_flight.remove(receipt_handle);
        Ok(())
    }
}

impl QueueSink for MemoryQueue {
    fn send_message(&self, queue_name: &str, body: &str) -> Result<String, StoreError> {
        if queue_name != self.name {
            return Err(StoreError::backend(
                "send_message",
                queue_name,
                "queue does not exist",
            ));
        }
        Ok(self.push(body))
    }
}
