use std::collections::VecDeque;
use std::time::Duration;

use tracing::debug;

use crate::adapters::object_store::ObjectStore;
use crate::adapters::queue::{QueueMessage, QueueSource, MAX_RECEIVE_BATCH};
use crate::adapters::StoreError;

pub const DEFAULT_QUEUE_BATCH_SIZE: i32 = MAX_RECEIVE_BATCH;
pub const DEFAULT_QUEUE_WAIT: Duration = Duration::from_secs(10);

/// A request fetched from its source but not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// Bucket key or queue message id.
    pub source_id: String,
    /// Token passed back on acknowledge: bucket key or receipt handle.
    pub receipt: String,
    pub body: Vec<u8>,
}

pub trait RequestSource {
    fn next_request(&mut self) -> Result<Option<PendingRequest>, StoreError>;

    /// Removes the request from its source so it is not delivered again.
    fn acknowledge(&mut self, request: &PendingRequest) -> Result<(), StoreError>;
}

/// Picks requests from a bucket in lexicographic key order.
pub struct BucketRequestSource<'a> {
    requests: &'a dyn ObjectStore,
    prefix: String,
}

impl<'a> BucketRequestSource<'a> {
    pub fn new(requests: &'a dyn ObjectStore) -> Self {
        Self::with_prefix(requests, "")
    }

    pub fn with_prefix(requests: &'a dyn ObjectStore, prefix: impl Into<String>) -> Self {
        Self {
            requests,
            prefix: prefix.into(),
        }
    }
}

impl RequestSource for BucketRequestSource<'_> {
    fn next_request(&mut self) -> Result<Option<PendingRequest>, StoreError> {
        let mut keys = self.requests.list_keys(&self.prefix)?;
        keys.sort_unstable();

        for key in keys {
            // Another consumer may have taken the key since it was listed.
            let Some(body) = self.requests.get_object(&key)? else {
                debug!(source_id = %key, "request vanished between list and get");
                continue;
            };
            return Ok(Some(PendingRequest {
                source_id: key.clone(),
                receipt: key,
                body,
            }));
        }
        Ok(None)
    }

    fn acknowledge(&mut self, request: &PendingRequest) -> Result<(), StoreError> {
        self.requests.delete_object(&request.receipt)
    }
}

/// Serves queue messages from a local FIFO cache, refilling it with one
/// long-poll receive whenever it runs dry.
pub struct QueueRequestSource<'a> {
    queue: &'a dyn QueueSource,
    cache: VecDeque<QueueMessage>,
    batch_size: i32,
    wait: Duration,
}

impl<'a> QueueRequestSource<'a> {
    pub fn new(queue: &'a dyn QueueSource) -> Self {
        Self::with_batch(queue, DEFAULT_QUEUE_BATCH_SIZE, DEFAULT_QUEUE_WAIT)
    }

    pub fn with_batch(queue: &'a dyn QueueSource, batch_size: i32, wait: Duration) -> Self {
        Self {
            queue,
            cache: VecDeque::new(),
            batch_size,
            wait,
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl RequestSource for QueueRequestSource<'_> {
    fn next_request(&mut self) -> Result<Option<PendingRequest>, StoreError> {
        if self.cache.is_empty() {
            let batch = self.queue.receive_messages(self.batch_size, self.wait)?;
            debug!(received = batch.len(), "refilled queue cache");
            self.cache.extend(batch);
        }

        Ok(self.cache.pop_front().map(|message| PendingRequest {
            source_id: message.message_id,
            receipt: message.receipt_handle,
            body: message.body.into_bytes(),
        }))
    }

    fn acknowledge(&mut self, request: &PendingRequest) -> Result<(), StoreError> {
        self.queue.delete_message(&request.receipt)
    }
}
