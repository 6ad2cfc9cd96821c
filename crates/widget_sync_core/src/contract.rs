use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const REQUEST_TYPE_CREATE: &str = "create";
pub const REQUEST_TYPE_UPDATE: &str = "update";
pub const REQUEST_TYPE_DELETE: &str = "delete";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Create,
    Update,
    Delete,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => REQUEST_TYPE_CREATE,
            Self::Update => REQUEST_TYPE_UPDATE,
            Self::Delete => REQUEST_TYPE_DELETE,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            REQUEST_TYPE_CREATE => Some(Self::Create),
            REQUEST_TYPE_UPDATE => Some(Self::Update),
            REQUEST_TYPE_DELETE => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a request's `otherAttributes` list.
///
/// Both halves are optional on the wire; entries missing either are skipped
/// when flattening.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attribute {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestEnvelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    widget_id: Option<String>,
    #[serde(default)]
    owner: Option<Value>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    other_attributes: Option<Vec<Attribute>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub request_id: Option<String>,
    pub widget_id: String,
    pub owner: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub other_attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub request_id: Option<String>,
    pub widget_id: String,
    pub owner: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub other_attributes: Vec<Attribute>,
    /// Update-only fields that are not part of the request schema.
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub request_id: Option<String>,
    pub widget_id: String,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WidgetRequest {
    Create(CreateRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
}

impl WidgetRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Create(_) => RequestKind::Create,
            Self::Update(_) => RequestKind::Update,
            Self::Delete(_) => RequestKind::Delete,
        }
    }

    pub fn widget_id(&self) -> &str {
        match self {
            Self::Create(request) => &request.widget_id,
            Self::Update(request) => &request.widget_id,
            Self::Delete(request) => &request.widget_id,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Create(request) => request.request_id.as_deref(),
            Self::Update(request) => request.request_id.as_deref(),
            Self::Delete(request) => request.request_id.as_deref(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request body is not a valid request object: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("request is missing 'type'")]
    MissingType,
    #[error("unknown request type '{0}'")]
    UnknownType(String),
    #[error("{kind} request is missing 'widgetId'")]
    MissingWidgetId { kind: RequestKind },
    #[error("create request for widget '{widget_id}' is missing 'owner'")]
    MissingOwner { widget_id: String },
    #[error("'owner' of widget '{widget_id}' must be a string, got {found}")]
    InvalidOwner {
        widget_id: String,
        found: &'static str,
    },
}

pub fn parse_request(body: &[u8]) -> Result<WidgetRequest, RequestError> {
    let envelope: RequestEnvelope = serde_json::from_slice(body)?;
    request_from_envelope(envelope)
}

fn request_from_envelope(envelope: RequestEnvelope) -> Result<WidgetRequest, RequestError> {
    let kind_name = envelope.kind.ok_or(RequestError::MissingType)?;
    let kind = RequestKind::parse(&kind_name).ok_or(RequestError::UnknownType(kind_name))?;

    let widget_id = match envelope.widget_id {
        Some(value) if !value.is_empty() => value,
        _ => return Err(RequestError::MissingWidgetId { kind }),
    };
    let owner = owner_string(&widget_id, envelope.owner)?;
    let other_attributes = envelope.other_attributes.unwrap_or_default();

    let request = match kind {
        RequestKind::Create => {
            let owner = owner.ok_or_else(|| RequestError::MissingOwner {
                widget_id: widget_id.clone(),
            })?;
            WidgetRequest::Create(CreateRequest {
                request_id: envelope.request_id,
                widget_id,
                owner,
                label: envelope.label,
                description: envelope.description,
                other_attributes,
            })
        }
        RequestKind::Update => WidgetRequest::Update(UpdateRequest {
            request_id: envelope.request_id,
            widget_id,
            owner,
            label: envelope.label,
            description: envelope.description,
            other_attributes,
            extra: envelope.extra,
        }),
        RequestKind::Delete => WidgetRequest::Delete(DeleteRequest {
            request_id: envelope.request_id,
            widget_id,
            owner,
        }),
    };

    Ok(request)
}

fn owner_string(widget_id: &str, owner: Option<Value>) -> Result<Option<String>, RequestError> {
    match owner {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(other) => Err(RequestError::InvalidOwner {
            widget_id: widget_id.to_string(),
            found: json_type_name(&other),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
