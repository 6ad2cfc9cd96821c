use std::time::Duration;

use aws_sdk_sqs::error::DisplayErrorContext;
use tracing::warn;

use super::{block_on, StoreError};

/// SQS limits for a single receive call.
pub const MAX_RECEIVE_BATCH: i32 = 10;
pub const MAX_WAIT_SECONDS: u64 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
}

pub trait QueueSource {
    /// Long-polls for up to `max_messages`, waiting at most `wait` for the first one.
    fn receive_messages(
        &self,
        max_messages: i32,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>, StoreError>;

    fn delete_message(&self, receipt_handle: &str) -> Result<(), StoreError>;
}

pub trait QueueSink {
    /// Sends `body` to the named queue and returns the queue-assigned message id.
    fn send_message(&self, queue_name: &str, body: &str) -> Result<String, StoreError>;
}

#[derive(Clone)]
pub struct SqsQueue {
    queue_url: String,
    client: aws_sdk_sqs::Client,
}

impl SqsQueue {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            client,
        }
    }

    /// Resolves `queue_name` to its URL.
    pub fn connect(client: aws_sdk_sqs::Client, queue_name: &str) -> Result<Self, StoreError> {
        let queue_url = resolve_queue_url(&client, queue_name)?;
        Ok(Self::new(client, queue_url))
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

impl QueueSource for SqsQueue {
    fn receive_messages(
        &self,
        max_messages: i32,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>, StoreError> {
        let wait_seconds = wait.as_secs().min(MAX_WAIT_SECONDS) as i32;
        let request = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages.clamp(1, MAX_RECEIVE_BATCH))
            .wait_time_seconds(wait_seconds);

        let output = block_on(async move { request.send().await }).map_err(|error| {
            StoreError::backend(
                "receive_message",
                self.queue_url.as_str(),
                DisplayErrorContext(error),
            )
        })?;

        let mut messages = Vec::with_capacity(output.messages().len());
        for message in output.messages() {
            let Some(receipt_handle) = message.receipt_handle() else {
                warn!(
                    message_id = message.message_id().unwrap_or_default(),
                    "skipping queue message without receipt handle"
                );
                continue;
            };
            messages.push(QueueMessage {
                message_id: message.message_id().unwrap_or_default().to_string(),
                receipt_handle: receipt_handle.to_string(),
                body: message.body().unwrap_or_default().to_string(),
            });
        }
        Ok(messages)
    }

    fn delete_message(&self, receipt_handle: &str) -> Result<(), StoreError> {
        let request = self
            .client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle);

        block_on(async move { request.send().await })
            .map(|_| ())
            .map_err(|error| {
                StoreError::backend(
                    "delete_message",
                    self.queue_url.as_str(),
                    DisplayErrorContext(error),
                )
            })
    }
}

/// Sends to queues by name, resolving the URL on every call.
#[derive(Clone)]
pub struct SqsQueueSink {
    client: aws_sdk_sqs::Client,
}

impl SqsQueueSink {
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }
}

impl QueueSink for SqsQueueSink {
    fn send_message(&self, queue_name: &str, body: &str) -> Result<String, StoreError> {
        let queue_url = resolve_queue_url(&self.client, queue_name)?;
        let request = self
            .client
            .send_message()
            .queue_url(&queue_url)
            .message_body(body);

        let output = block_on(async move { request.send().await }).map_err(|error| {
            StoreError::backend("send_message", queue_url.as_str(), DisplayErrorContext(error))
        })?;
        Ok(output.message_id().unwrap_or_default().to_string())
    }
}

fn resolve_queue_url(client: &aws_sdk_sqs::Client, queue_name: &str) -> Result<String, StoreError> {
    let request = client.get_queue_url().queue_name(queue_name);
    let output = block_on(async move { request.send().await }).map_err(|error| {
        StoreError::backend("get_queue_url", queue_name, DisplayErrorContext(error))
    })?;
    output
        .queue_url()
        .map(str::to_string)
        .ok_or_else(|| StoreError::backend("get_queue_url", queue_name, "no queue url returned"))
}
