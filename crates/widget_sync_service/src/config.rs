use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::adapters::queue::{MAX_RECEIVE_BATCH, MAX_WAIT_SECONDS};
use crate::handlers::poll::{PollConfig, DEFAULT_EMPTY_POLL_LIMIT};
use crate::runtime::widget::{ID_FIELD, WIDGET_ID_FIELD};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Strategy {
    #[default]
    Polling,
    /// Reserved; not implemented.
    EventDriven,
}

/// What happens to a source request that could not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DispositionPolicy {
    /// Remove the request and continue.
    Delete,
    /// Copy the request under `dead-letter/` in the storage bucket, remove it, continue.
    DeadLetter,
    /// Leave the request in place and stop.
    Halt,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "widget_consumer",
    about = "Apply widget change-requests to the widget object store and table",
    long_about = "Drains widget create/update/delete requests from a request bucket or\n\
                  a queue, writes each widget to the storage bucket and the table, and\n\
                  exits after a streak of empty polls."
)]
pub struct ConsumerArgs {
    /// Bucket holding pending request objects
    #[arg(long, env = "WIDGET_REQUEST_BUCKET")]
    pub request_bucket: Option<String>,
    /// Queue delivering request messages; takes precedence over the request bucket
    #[arg(long, env = "WIDGET_QUEUE_NAME")]
    pub queue_name: Option<String>,
    /// Bucket receiving widget objects
    #[arg(long, env = "WIDGET_STORAGE_BUCKET")]
    pub storage_bucket: String,
    /// Table receiving widget items
    #[arg(long, env = "WIDGET_TABLE_NAME")]
    pub table_name: String,
    /// Primary key attribute of the table: `id` or `widgetId`
    #[arg(long, env = "WIDGET_TABLE_KEY_ATTRIBUTE", default_value = "id")]
    pub table_key_attribute: String,
    #[arg(value_enum, long, env = "WIDGET_STRATEGY", default_value_t = Strategy::Polling)]
    pub strategy: Strategy,
    /// Consecutive empty polls before the consumer exits
    #[arg(long, env = "WIDGET_EMPTY_POLL_LIMIT", default_value_t = DEFAULT_EMPTY_POLL_LIMIT)]
    pub empty_poll_limit: u32,
    /// Sleep after an empty poll, in milliseconds
    #[arg(long, env = "WIDGET_POLL_INTERVAL_MS", default_value_t = 100)]
    pub poll_interval_ms: u64,
    /// Messages requested per queue receive
    #[arg(long, env = "WIDGET_QUEUE_BATCH_SIZE", default_value_t = MAX_RECEIVE_BATCH)]
    pub queue_batch_size: i32,
    /// Long-poll wait per queue receive, in seconds
    #[arg(long, env = "WIDGET_QUEUE_WAIT_SECONDS", default_value_t = 10)]
    pub queue_wait_seconds: u64,
    #[arg(value_enum, long, env = "WIDGET_ON_MALFORMED", default_value_t = DispositionPolicy::Delete)]
    pub on_malformed: DispositionPolicy,
    #[arg(value_enum, long, env = "WIDGET_ON_STORE_FAILURE", default_value_t = DispositionPolicy::Halt)]
    pub on_store_failure: DispositionPolicy,
    /// Endpoint override for all AWS clients (e.g. LocalStack)
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSettings {
    Bucket {
        bucket: String,
    },
    Queue {
        queue_name: String,
        batch_size: i32,
        wait: Duration,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerSettings {
    pub source: SourceSettings,
    pub storage_bucket: String,
    pub table_name: String,
    pub table_key_attribute: String,
    pub endpoint_url: Option<String>,
    pub poll: PollConfig,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("the event-driven strategy is not implemented")]
    EventDrivenUnsupported,
    #[error("either --request-bucket or --queue-name is required")]
    MissingSource,
    #[error("{0} cannot be empty")]
    Empty(&'static str),
    #[error(
        "table key attribute must be '{id}' or '{widget_id}', got '{0}'",
        id = ID_FIELD,
        widget_id = WIDGET_ID_FIELD
    )]
    KeyAttribute(String),
    #[error("request bucket '{0}' is also the storage bucket")]
    SameBucket(String),
    #[error("queue batch size must be between 1 and {max}, got {0}", max = MAX_RECEIVE_BATCH)]
    BatchSize(i32),
    #[error("queue wait must be at most {max} seconds, got {0}", max = MAX_WAIT_SECONDS)]
    QueueWait(u64),
}

impl ConsumerArgs {
    pub fn into_settings(self) -> Result<ConsumerSettings, ConfigError> {
        if self.strategy == Strategy::EventDriven {
            return Err(ConfigError::EventDrivenUnsupported);
        }

        let storage_bucket = non_empty(self.storage_bucket, "storage bucket")?;
        let table_name = non_empty(self.table_name, "table name")?;
        let table_key_attribute = non_empty(self.table_key_attribute, "table key attribute")?;
        if table_key_attribute != ID_FIELD && table_key_attribute != WIDGET_ID_FIELD {
            return Err(ConfigError::KeyAttribute(table_key_attribute));
        }

        let source = match (
            self.queue_name.filter(|name| !name.trim().is_empty()),
            self.request_bucket.filter(|name| !name.trim().is_empty()),
        ) {
            (Some(queue_name), _) => {
                if !(1..=MAX_RECEIVE_BATCH).contains(&self.queue_batch_size) {
                    return Err(ConfigError::BatchSize(self.queue_batch_size));
                }
                if self.queue_wait_seconds > MAX_WAIT_SECONDS {
                    return Err(ConfigError::QueueWait(self.queue_wait_seconds));
                }
                SourceSettings::Queue {
                    queue_name,
                    batch_size: self.queue_batch_size,
                    wait: Duration::from_secs(self.queue_wait_seconds),
                }
            }
            // Widget and dead-letter objects would be listed as requests.
            (None, Some(bucket)) if bucket == storage_bucket => {
                return Err(ConfigError::SameBucket(bucket));
            }
            (None, Some(bucket)) => SourceSettings::Bucket { bucket },
            (None, None) => return Err(ConfigError::MissingSource),
        };

        Ok(ConsumerSettings {
            source,
            storage_bucket,
            table_name,
            table_key_attribute,
            endpoint_url: self.endpoint_url,
            poll: PollConfig {
                empty_poll_limit: self.empty_poll_limit,
                idle_interval: Duration::from_millis(self.poll_interval_ms),
                on_malformed: self.on_malformed,
                on_store_failure: self.on_store_failure,
            },
        })
    }
}

fn non_empty(value: String, name: &'static str) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Empty(name))
    } else {
        Ok(value)
    }
}
