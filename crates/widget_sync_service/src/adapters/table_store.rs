use std::collections::HashMap;

use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use serde_json::{Map, Number, Value};

use super::{block_on, StoreError};

pub type Item = Map<String, Value>;

/// Keyed item store. The primary key attribute is a string attribute whose
/// name is fixed per table (`id` or `widgetId` depending on deployment).
pub trait TableStore {
    fn key_attribute(&self) -> &str;

    fn get_item(&self, key: &str) -> Result<Option<Item>, StoreError>;

    fn put_item(&self, item: &Item) -> Result<(), StoreError>;

    /// Returns whether an item existed under `key`. Deleting a missing key succeeds.
    fn delete_item(&self, key: &str) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct DynamoTableStore {
    table_name: String,
    key_attribute: String,
    client: aws_sdk_dynamodb::Client,
}

impl std::fmt::Debug for DynamoTableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoTableStore")
            .field("table_name", &self.table_name)
            .field("key_attribute", &self.key_attribute)
            .finish()
    }
}

impl DynamoTableStore {
    pub fn new(
        client: aws_sdk_dynamodb::Client,
        table_name: impl Into<String>,
        key_attribute: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            key_attribute: key_attribute.into(),
            client,
        }
    }

    fn target(&self, key: &str) -> String {
        format!("{}[{}={key}]", self.table_name, self.key_attribute)
    }
}

impl TableStore for DynamoTableStore {
    fn key_attribute(&self) -> &str {
        &self.key_attribute
    }

    fn get_item(&self, key: &str) -> Result<Option<Item>, StoreError> {
        let request = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(&self.key_attribute, AttributeValue::S(key.to_string()))
            .consistent_read(true);

        block_on(async move { request.send().await })
            .map(|output| output.item().map(attributes_to_item))
            .map_err(|error| {
                StoreError::backend("get_item", self.target(key), DisplayErrorContext(error))
            })
    }

    fn put_item(&self, item: &Item) -> Result<(), StoreError> {
        let key = item
            .get(&self.key_attribute)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StoreError::invalid_item(
                    &self.table_name,
                    format!("missing string key attribute '{}'", self.key_attribute),
                )
            })?;
        let request = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item_to_attributes(item)));

        block_on(async move { request.send().await })
            .map(|_| ())
            .map_err(|error| {
                StoreError::backend("put_item", self.target(key), DisplayErrorContext(error))
            })
    }

    fn delete_item(&self, key: &str) -> Result<bool, StoreError> {
        let request = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key(&self.key_attribute, AttributeValue::S(key.to_string()))
            .return_values(ReturnValue::AllOld);

        block_on(async move { request.send().await })
            .map(|output| output.attributes().is_some())
            .map_err(|error| {
                StoreError::backend("delete_item", self.target(key), DisplayErrorContext(error))
            })
    }
}

pub fn item_to_attributes(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter()
        .map(|(name, value)| (name.clone(), to_attribute_value(value)))
        .collect()
}

pub fn attributes_to_item(attributes: &HashMap<String, AttributeValue>) -> Item {
    attributes
        .iter()
        .map(|(name, value)| (name.clone(), from_attribute_value(value)))
        .collect()
}

pub fn to_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(flag) => AttributeValue::Bool(*flag),
        Value::Number(number) => AttributeValue::N(number.to_string()),
        Value::String(text) => AttributeValue::S(text.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute_value).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(name, value)| (name.clone(), to_attribute_value(value)))
                .collect(),
        ),
    }
}

pub fn from_attribute_value(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(flag) => Value::Bool(*flag),
        AttributeValue::N(text) => number_value(text),
        AttributeValue::S(text) => Value::String(text.clone()),
        AttributeValue::L(values) => Value::Array(values.iter().map(from_attribute_value).collect()),
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(name, value)| (name.clone(), from_attribute_value(value)))
                .collect(),
        ),
        AttributeValue::Ss(values) => {
            Value::Array(values.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(values) => Value::Array(values.iter().map(|n| number_value(n)).collect()),
        // Binary attributes are never written by this service.
        _ => Value::Null,
    }
}

fn number_value(text: &str) -> Value {
    serde_json::from_str::<Number>(text)
        .map(Value::Number)
        .unwrap_or_else(|_| Value::String(text.to_string()))
}
