use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use crate::adapters::queue::QueueSink;
use crate::runtime::contract::{Attribute, RequestKind};

pub const QUEUE_NAME_FIELD: &str = "queueName";
pub const SUBMITTED_MESSAGE: &str = "Widget Request submitted successfully.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

/// A submitted change-request. Serializes to the queued message, which
/// leaves out `queueName`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRequest {
    #[serde(skip_serializing)]
    pub queue_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub request_id: String,
    pub widget_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_attributes: Option<Vec<Attribute>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct SubmittedResponse<'a> {
    message: &'a str,
    request_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    #[error("Request payload must be a JSON object")]
    NotAnObject,
    #[error("Malformed JSON body: {0}")]
    MalformedBody(String),
    #[error("Malformed request: {0}")]
    Malformed(String),
    #[error("Invalid request: 'type' must be one of create, update, delete, got '{0}'")]
    InvalidType(String),
    #[error("Invalid request: otherAttributes[{0}] needs both 'name' and 'value'")]
    InvalidAttribute(usize),
}

/// Validates a submitted change-request and forwards it to the queue it names.
pub fn handle_intake_event(event: Value, sink: &dyn QueueSink) -> ApiGatewayResponse {
    let request = match normalize_apigw_event(event).and_then(validate_intake_request) {
        Ok(value) => value,
        Err(intake_error) => {
            warn!(error = %intake_error, "rejected intake request");
            return validation_error_response(&intake_error.to_string());
        }
    };

    let body = match serde_json::to_string(&request) {
        Ok(value) => value,
        Err(encode_error) => {
            return error_response(
                500,
                json!({
                    "error": "serialization_error",
                    "message": encode_error.to_string(),
                }),
            );
        }
    };

    let queue_name = request.queue_name.as_str();
    match sink.send_message(queue_name, &body) {
        Ok(message_id) => {
            info!(queue_name = %queue_name, message_id = %message_id, "request enqueued");
            success_response(
                200,
                SubmittedResponse {
                    message: SUBMITTED_MESSAGE,
                    request_id: message_id,
                },
            )
        }
        Err(send_error) => {
            error!(queue_name = %queue_name, error = %send_error, "failed to enqueue request");
            error_response(
                500,
                json!({
                    "error": "enqueue_failed",
                    "message": send_error.to_string(),
                    "queue_name": queue_name,
                }),
            )
        }
    }
}

pub fn validate_intake_request(payload: Value) -> Result<IntakeRequest, IntakeError> {
    if !payload.is_object() {
        return Err(IntakeError::NotAnObject);
    }
    let request = serde_json::from_value::<IntakeRequest>(payload)
        .map_err(|decode_error| IntakeError::Malformed(decode_error.to_string()))?;

    if RequestKind::parse(&request.kind).is_none() {
        return Err(IntakeError::InvalidType(request.kind));
    }

    let attributes = request.other_attributes.as_deref().unwrap_or_default();
    if let Some(index) = attributes
        .iter()
        .position(|attribute| attribute.name.is_none() || attribute.value.is_none())
    {
        return Err(IntakeError::InvalidAttribute(index));
    }

    Ok(request)
}

fn normalize_apigw_event(event: Value) -> Result<Value, IntakeError> {
    let Some(object) = event.as_object() else {
        return Err(IntakeError::NotAnObject);
    };

    let Some(body) = object.get("body") else {
        return Ok(event);
    };

    match body {
        Value::Null => Ok(json!({})),
        Value::Object(_) => Ok(body.clone()),
        Value::String(text) => serde_json::from_str(text)
            .map_err(|parse_error| IntakeError::MalformedBody(parse_error.to_string())),
        _ => Err(IntakeError::NotAnObject),
    }
}

fn validation_error_response(message: &str) -> ApiGatewayResponse {
    error_response(
        400,
        json!({
            "error": "validation_error",
            "message": message,
        }),
    )
}

fn success_response(status_code: u16, payload: impl Serialize) -> ApiGatewayResponse {
    match serde_json::to_string(&payload) {
        Ok(body) => ApiGatewayResponse {
            status_code,
            headers: json!({"Content-Type": "application/json"}),
            body,
        },
        Err(encode_error) => error_response(
            500,
            json!({
                "error": "serialization_error",
                "message": encode_error.to_string(),
            }),
        ),
    }
}

fn error_response(status_code: u16, payload: Value) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: json!({"Content-Type": "application/json"}),
        body: payload.to_string(),
    }
}
