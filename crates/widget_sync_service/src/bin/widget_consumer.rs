use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use aws_config::{BehaviorVersion, SdkConfig};
use clap::Parser;
use tracing::{error, info, warn};
use widget_sync_service::adapters::object_store::S3ObjectStore;
use widget_sync_service::adapters::queue::SqsQueue;
use widget_sync_service::adapters::table_store::DynamoTableStore;
use widget_sync_service::config::{ConsumerArgs, ConsumerSettings, SourceSettings};
use widget_sync_service::handlers::poll::{run_poll_loop, PollError, PollSummary};
use widget_sync_service::handlers::processor::WidgetStores;
use widget_sync_service::handlers::source::{
    BucketRequestSource, QueueRequestSource, RequestSource,
};
use widget_sync_service::logging::{init_tracing, LogFormat};

#[derive(Debug, thiserror::Error)]
enum ConsumerError {
    #[error("could not connect to queue: {0}")]
    Connect(#[from] widget_sync_service::adapters::StoreError),
    #[error(transparent)]
    Poll(#[from] PollError),
}

async fn load_aws_config(endpoint_url: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(url) = endpoint_url {
        loader = loader.endpoint_url(url);
    }
    loader.load().await
}

fn s3_client(config: &SdkConfig, endpoint_url: Option<&str>) -> aws_sdk_s3::Client {
    // Local S3 emulators only answer path-style requests.
    let s3_config = aws_sdk_s3::config::Builder::from(config)
        .force_path_style(endpoint_url.is_some())
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}

fn run(
    settings: &ConsumerSettings,
    aws: &SdkConfig,
    cancel: &AtomicBool,
) -> Result<PollSummary, ConsumerError> {
    let s3 = s3_client(aws, settings.endpoint_url.as_deref());
    let objects = S3ObjectStore::new(s3.clone(), settings.storage_bucket.clone());
    let table = DynamoTableStore::new(
        aws_sdk_dynamodb::Client::new(aws),
        settings.table_name.clone(),
        settings.table_key_attribute.clone(),
    );
    let stores = WidgetStores {
        objects: &objects,
        table: &table,
    };

    match &settings.source {
        SourceSettings::Bucket { bucket } => {
            info!(request_bucket = %bucket, "polling request bucket");
            let requests = S3ObjectStore::new(s3, bucket.clone());
            let mut source = BucketRequestSource::new(&requests);
            drain(&mut source, stores, settings, cancel)
        }
        SourceSettings::Queue {
            queue_name,
            batch_size,
            wait,
        } => {
            let queue = SqsQueue::connect(aws_sdk_sqs::Client::new(aws), queue_name)?;
            info!(queue_name = %queue_name, queue_url = %queue.queue_url(), "polling request queue");
            let mut source = QueueRequestSource::with_batch(&queue, *batch_size, *wait);
            drain(&mut source, stores, settings, cancel)
        }
    }
}

fn drain(
    source: &mut dyn RequestSource,
    stores: WidgetStores<'_>,
    settings: &ConsumerSettings,
    cancel: &AtomicBool,
) -> Result<PollSummary, ConsumerError> {
    Ok(run_poll_loop(source, stores, &settings.poll, cancel)?)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = ConsumerArgs::parse();
    init_tracing(LogFormat::Text);

    let settings = match args.into_settings() {
        Ok(value) => value,
        Err(config_error) => {
            error!(error = %config_error, "invalid configuration");
            return ExitCode::from(2);
        }
    };

    let aws = load_aws_config(settings.endpoint_url.as_deref()).await;

    let cancel = Arc::new(AtomicBool::new(false));
    let signal_flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after the current request");
            signal_flag.store(true, Ordering::Relaxed);
        }
    });

    match run(&settings, &aws, &cancel) {
        Ok(summary) => {
            info!(
                consumed = summary.consumed,
                stop_reason = ?summary.stop_reason,
                "consumer finished"
            );
            ExitCode::SUCCESS
        }
        Err(consumer_error) => {
            error!(error = %consumer_error, "consumer stopped");
            ExitCode::FAILURE
        }
    }
}
