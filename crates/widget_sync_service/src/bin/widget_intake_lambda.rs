use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use widget_sync_service::adapters::queue::SqsQueueSink;
use widget_sync_service::handlers::intake::{handle_intake_event, ApiGatewayResponse};
use widget_sync_service::logging::{init_tracing, LogFormat};

async fn handle_request(
    sink: &SqsQueueSink,
    event: LambdaEvent<Value>,
) -> Result<ApiGatewayResponse, Error> {
    Ok(handle_intake_event(event.payload, sink))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing(LogFormat::Json);

    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let sink = SqsQueueSink::new(aws_sdk_sqs::Client::new(&config));

    let sink = &sink;
    lambda_runtime::run(service_fn(move |event| handle_request(sink, event))).await
}
