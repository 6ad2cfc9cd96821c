use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::contract::{CreateRequest, UpdateRequest};
use crate::flatten::flatten_attributes;
use crate::storage_keys::widget_object_key;

pub const ID_FIELD: &str = "id";
pub const WIDGET_ID_FIELD: &str = "widgetId";
pub const OWNER_FIELD: &str = "owner";
pub const LABEL_FIELD: &str = "label";
pub const DESCRIPTION_FIELD: &str = "description";
pub const REQUEST_ID_FIELD: &str = "requestId";
/// Request-only fields that never appear on a stored record.
pub const TYPE_FIELD: &str = "type";
pub const OTHER_ATTRIBUTES_FIELD: &str = "otherAttributes";

/// Persisted widget record shared by the object store and the table store.
///
/// `id` and `widgetId` always carry the same value so the record can be
/// keyed by either attribute.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Widget {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "widgetId", default)]
    pub widget_id: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "requestId", default)]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

/// Field-by-field overwrite applied to a stored widget on update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetPatch {
    pub owner: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub request_id: Option<String>,
    /// Extra update fields with flattened attributes merged over them.
    pub fields: Map<String, Value>,
}

impl From<UpdateRequest> for WidgetPatch {
    fn from(request: UpdateRequest) -> Self {
        Self {
            owner: request.owner,
            label: request.label,
            description: request.description,
            request_id: request.request_id,
            fields: flatten_attributes(present_fields(request.extra), &request.other_attributes),
        }
    }
}

impl Widget {
    pub fn new(widget_id: impl Into<String>) -> Self {
        let widget_id = widget_id.into();
        Self {
            id: widget_id.clone(),
            widget_id,
            owner: None,
            label: None,
            description: None,
            request_id: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn from_create(request: &CreateRequest) -> Self {
        let mut widget = Self::new(request.widget_id.clone());
        widget.owner = Some(request.owner.clone());
        widget.label = request.label.clone();
        widget.description = request.description.clone();
        widget.request_id = request.request_id.clone();
        widget.merge_fields(flatten_attributes(Map::new(), &request.other_attributes));
        widget
    }

    /// Decodes a stored item and pins both identifiers to `widget_id`.
    pub fn from_item(item: Map<String, Value>, widget_id: &str) -> Result<Self, serde_json::Error> {
        let mut widget: Widget = serde_json::from_value(Value::Object(item))?;
        widget.id = widget_id.to_string();
        widget.widget_id = widget_id.to_string();
        Ok(widget)
    }

    pub fn apply(&mut self, patch: WidgetPatch) {
        if let Some(owner) = patch.owner {
            self.owner = Some(owner);
        }
        if let Some(label) = patch.label {
            self.label = Some(label);
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(request_id) = patch.request_id {
            self.request_id = Some(request_id);
        }
        self.merge_fields(patch.fields);
    }

    pub fn merge_fields(&mut self, fields: Map<String, Value>) {
        for (name, value) in fields {
            self.set_field(name, value);
        }
    }

    /// Routes a dynamic field to its typed slot or the attribute map.
    ///
    /// Identifier fields are never overwritten and request-only fields are dropped.
    pub fn set_field(&mut self, name: String, value: Value) {
        match name.as_str() {
            ID_FIELD | WIDGET_ID_FIELD | TYPE_FIELD | OTHER_ATTRIBUTES_FIELD => {}
            OWNER_FIELD => self.owner = scalar_string(value),
            LABEL_FIELD => self.label = scalar_string(value),
            DESCRIPTION_FIELD => self.description = scalar_string(value),
            REQUEST_ID_FIELD => self.request_id = scalar_string(value),
            _ => {
                self.attributes.insert(name, value);
            }
        }
    }

    pub fn object_key(&self) -> String {
        widget_object_key(self.owner.as_deref().unwrap_or_default(), &self.widget_id)
    }

    /// Flat item form. Absent owner, label and description are written as nulls.
    pub fn to_item(&self) -> Map<String, Value> {
        let mut item = Map::new();
        item.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        item.insert(
            WIDGET_ID_FIELD.to_string(),
            Value::String(self.widget_id.clone()),
        );
        item.insert(OWNER_FIELD.to_string(), optional_string(&self.owner));
        item.insert(LABEL_FIELD.to_string(), optional_string(&self.label));
        item.insert(
            DESCRIPTION_FIELD.to_string(),
            optional_string(&self.description),
        );
        if let Some(request_id) = &self.request_id {
            item.insert(
                REQUEST_ID_FIELD.to_string(),
                Value::String(request_id.clone()),
            );
        }
        for (name, value) in &self.attributes {
            item.insert(name.clone(), value.clone());
        }
        item
    }

    pub fn to_json_bytes(&self) -> Vec<u8> {
        Value::Object(self.to_item()).to_string().into_bytes()
    }
}

/// Explicit nulls in an update mean "not provided".
fn present_fields(mut fields: Map<String, Value>) -> Map<String, Value> {
    fields.retain(|_, value| !value.is_null());
    fields
}

fn optional_string(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

fn scalar_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}
