use serde_json::{Map, Value};

use crate::contract::Attribute;

/// Merges `attributes` into `base` as top-level fields.
///
/// Pairs are applied in order, so a repeated name keeps its last value.
/// Pairs without a name, with an empty name, or without a value are skipped.
pub fn flatten_attributes(
    mut base: Map<String, Value>,
    attributes: &[Attribute],
) -> Map<String, Value> {
    for attribute in attributes {
        let (Some(name), Some(value)) = (attribute.name.as_deref(), attribute.value.as_ref())
        else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        base.insert(name.to_string(), Value::String(value.clone()));
    }
    base
}
