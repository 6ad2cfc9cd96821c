use tracing::{error, info, warn};

use crate::adapters::object_store::ObjectStore;
use crate::adapters::table_store::TableStore;
use crate::adapters::StoreError;
use crate::runtime::contract::{
    parse_request, CreateRequest, DeleteRequest, RequestError, UpdateRequest, WidgetRequest,
};
use crate::runtime::storage_keys::widget_object_key;
use crate::runtime::widget::{Widget, WidgetPatch};

/// The two stores every widget is written to.
///
/// Writes are independent: the object store and the table are not updated
/// atomically, and each write is safe to repeat.
#[derive(Clone, Copy)]
pub struct WidgetStores<'a> {
    pub objects: &'a dyn ObjectStore,
    pub table: &'a dyn TableStore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Created {
        widget_id: String,
        object_key: String,
    },
    Updated {
        widget_id: String,
        object_key: String,
    },
    Deleted {
        widget_id: String,
        object_key: String,
        item_existed: bool,
    },
    /// Update target is missing from the table.
    NotFound { widget_id: String },
    /// Malformed request, nothing was written.
    Rejected { reason: String },
    /// Unrecognized request type, nothing was written.
    Ignored { request_type: String },
    /// Best-effort update or delete hit a store error.
    StoreFailed { widget_id: String, error: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to store widget '{widget_id}': {source}")]
    Create {
        widget_id: String,
        #[source]
        source: StoreError,
    },
}

pub fn process_request(
    body: &[u8],
    stores: WidgetStores<'_>,
) -> Result<RequestOutcome, ProcessError> {
    let request = match parse_request(body) {
        Ok(value) => value,
        Err(RequestError::UnknownType(request_type)) => {
            warn!(request_type = %request_type, "ignoring request with unknown type");
            return Ok(RequestOutcome::Ignored { request_type });
        }
        Err(request_error) => {
            error!(error = %request_error, "rejecting malformed request");
            return Ok(RequestOutcome::Rejected {
                reason: request_error.to_string(),
            });
        }
    };

    info!(
        request_type = %request.kind(),
        widget_id = request.widget_id(),
        request_id = request.request_id().unwrap_or_default(),
        "processing request"
    );

    match request {
        WidgetRequest::Create(create) => handle_create(&create, stores),
        WidgetRequest::Update(update) => Ok(handle_update(update, stores)),
        WidgetRequest::Delete(delete) => Ok(handle_delete(&delete, stores)),
    }
}

pub fn handle_create(
    request: &CreateRequest,
    stores: WidgetStores<'_>,
) -> Result<RequestOutcome, ProcessError> {
    let widget = Widget::from_create(request);
    let object_key = widget.object_key();
    let create_error = |source: StoreError| ProcessError::Create {
        widget_id: widget.widget_id.clone(),
        source,
    };

    stores
        .objects
        .put_object(&object_key, &widget.to_json_bytes())
        .map_err(create_error)?;
    info!(widget_id = %widget.widget_id, object_key = %object_key, "stored widget object");

    stores
        .table
        .put_item(&widget.to_item())
        .map_err(create_error)?;
    info!(widget_id = %widget.widget_id, "stored widget item");

    Ok(RequestOutcome::Created {
        widget_id: widget.widget_id,
        object_key,
    })
}

pub fn handle_update(request: UpdateRequest, stores: WidgetStores<'_>) -> RequestOutcome {
    let widget_id = request.widget_id.clone();
    match apply_update(request, stores) {
        Ok(Some(object_key)) => {
            info!(widget_id = %widget_id, object_key = %object_key, "updated widget");
            RequestOutcome::Updated {
                widget_id,
                object_key,
            }
        }
        Ok(None) => {
            error!(widget_id = %widget_id, "widget not found for update");
            RequestOutcome::NotFound { widget_id }
        }
        Err(store_error) => {
            error!(widget_id = %widget_id, error = %store_error, "update failed");
            RequestOutcome::StoreFailed {
                widget_id,
                error: store_error.to_string(),
            }
        }
    }
}

fn apply_update(
    request: UpdateRequest,
    stores: WidgetStores<'_>,
) -> Result<Option<String>, StoreError> {
    let Some(item) = stores.table.get_item(&request.widget_id)? else {
        return Ok(None);
    };
    let mut widget = Widget::from_item(item, &request.widget_id)
        .map_err(|error| StoreError::invalid_item(request.widget_id.as_str(), error))?;
    widget.apply(WidgetPatch::from(request));

    stores.table.put_item(&widget.to_item())?;
    let object_key = widget.object_key();
    stores
        .objects
        .put_object(&object_key, &widget.to_json_bytes())?;
    Ok(Some(object_key))
}

pub fn handle_delete(request: &DeleteRequest, stores: WidgetStores<'_>) -> RequestOutcome {
    let widget_id = request.widget_id.clone();
    let object_key = widget_object_key(request.owner.as_deref().unwrap_or_default(), &widget_id);

    let table_result = stores.table.delete_item(&widget_id);
    let object_result = stores.objects.delete_object(&object_key);

    match (table_result, object_result) {
        (Ok(item_existed), Ok(())) => {
            if item_existed {
                info!(widget_id = %widget_id, object_key = %object_key, "deleted widget");
            } else {
                info!(
                    widget_id = %widget_id,
                    object_key = %object_key,
                    "widget was not in the table; delete is a no-op"
                );
            }
            RequestOutcome::Deleted {
                widget_id,
                object_key,
                item_existed,
            }
        }
        (table_result, object_result) => {
            let errors: Vec<String> = [table_result.err(), object_result.err()]
                .into_iter()
                .flatten()
                .map(|store_error| store_error.to_string())
                .collect();
            let message = errors.join("; ");
            error!(widget_id = %widget_id, error = %message, "delete failed");
            RequestOutcome::StoreFailed {
                widget_id,
                error: message,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde_json::{json, Value};

    use crate::adapters::memory::{MemoryObjectStore, MemoryTableStore};
    use crate::adapters::table_store::Item;

    use super::*;

    struct FailingObjectStore;

    impl ObjectStore for FailingObjectStore {
        fn put_object(&self, key: &str, _body: &[u8]) -> Result<(), StoreError> {
            Err(StoreError::backend("put_object", key, "injected failure"))
        }

        fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Err(StoreError::backend("get_object", key, "injected failure"))
        }

        fn delete_object(&self, key: &str) -> Result<(), StoreError> {
            Err(StoreError::backend("delete_object", key, "injected failure"))
        }

        fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::backend("list_keys", prefix, "injected failure"))
        }
    }

    struct UnavailableTable {
        calls: Cell<usize>,
    }

    impl TableStore for UnavailableTable {
        fn key_attribute(&self) -> &str {
            "id"
        }

        fn get_item(&self, key: &str) -> Result<Option<Item>, StoreError> {
            self.calls.set(self.calls.get() + 1);
            Err(StoreError::backend("get_item", key, "throttled"))
        }

        fn put_item(&self, _item: &Item) -> Result<(), StoreError> {
            self.calls.set(self.calls.get() + 1);
            Err(StoreError::backend("put_item", "widgets", "throttled"))
        }

        fn delete_item(&self, key: &str) -> Result<bool, StoreError> {
            self.calls.set(self.calls.get() + 1);
            Err(StoreError::backend("delete_item", key, "throttled"))
        }
    }

    fn body(value: Value) -> Vec<u8> {
        value.to_string().into_bytes()
    }

    fn create_body() -> Vec<u8> {
        body(json!({
            "type": "create",
            "widgetId": "w1",
            "owner": "Jane Doe",
            "label": "L",
            "otherAttributes": [{"name": "color", "value": "red"}]
        }))
    }

    #[test]
    fn create_writes_both_stores() {
        let objects = MemoryObjectStore::new();
        let table = MemoryTableStore::new("id");
        let stores = WidgetStores {
            objects: &objects,
            table: &table,
        };

        let outcome = process_request(&create_body(), stores).expect("create should pass");

        assert_eq!(
            outcome,
            RequestOutcome::Created {
                widget_id: "w1".to_string(),
                object_key: "widgets/jane-doe/w1".to_string(),
            }
        );
        assert_eq!(
            objects.json("widgets/jane-doe/w1"),
            Some(json!({
                "id": "w1",
                "widgetId": "w1",
                "owner": "Jane Doe",
                "label": "L",
                "description": null,
                "color": "red"
            }))
        );
        let item = table.item("w1").expect("item should exist");
        assert_eq!(item.get("color"), Some(&json!("red")));
        assert_eq!(item.get("widgetId"), Some(&json!("w1")));
    }

    #[test]
    fn create_is_idempotent() {
        let objects = MemoryObjectStore::new();
        let table = MemoryTableStore::new("id");
        let stores = WidgetStores {
            objects: &objects,
            table: &table,
        };

        process_request(&create_body(), stores).expect("create should pass");
        let first_object = objects.body("widgets/jane-doe/w1");
        let first_item = table.item("w1");

        process_request(&create_body(), stores).expect("create should pass");

        assert_eq!(objects.keys().len(), 1);
        assert_eq!(table.len(), 1);
        assert_eq!(objects.body("widgets/jane-doe/w1"), first_object);
        assert_eq!(table.item("w1"), first_item);
    }

    #[test]
    fn create_uses_configured_key_attribute() {
        let objects = MemoryObjectStore::new();
        let table = MemoryTableStore::new("widgetId");
        let stores = WidgetStores {
            objects: &objects,
            table: &table,
        };

        process_request(&create_body(), stores).expect("create should pass");
        assert!(table.item("w1").is_some());
    }

    #[test]
    fn create_store_failure_propagates() {
        let objects = FailingObjectStore;
        let table = MemoryTableStore::new("id");
        let stores = WidgetStores {
            objects: &objects,
            table: &table,
        };

        let error = process_request(&create_body(), stores).expect_err("create should fail");
        assert!(error.to_string().contains("failed to store widget 'w1'"));
        assert!(table.is_empty());
    }

    #[test]
    fn create_without_owner_writes_nothing() {
        let objects = MemoryObjectStore::new();
        let table = MemoryTableStore::new("id");
        let stores = WidgetStores {
            objects: &objects,
            table: &table,
        };

        let outcome = process_request(
            &body(json!({"type": "create", "widgetId": "w1", "owner": 7})),
            stores,
        )
        .expect("processing should not error");

        assert!(matches!(outcome, RequestOutcome::Rejected { .. }));
        assert!(objects.keys().is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn update_merges_only_provided_fields() {
        let objects = MemoryObjectStore::new();
        let table = MemoryTableStore::new("id");
        let stored: Item = match json!({"id": "1", "label": "Old", "description": "Old"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        table.put_item(&stored).expect("seed should pass");
        let stores = WidgetStores {
            objects: &objects,
            table: &table,
        };

        let outcome = process_request(
            &body(json!({"type": "update", "widgetId": "1", "description": "New"})),
            stores,
        )
        .expect("update should not error");

        assert!(matches!(outcome, RequestOutcome::Updated { .. }));
        let item = table.item("1").expect("item should exist");
        assert_eq!(item.get("id"), Some(&json!("1")));
        assert_eq!(item.get("label"), Some(&json!("Old")));
        assert_eq!(item.get("description"), Some(&json!("New")));
        assert!(!item.contains_key("type"));
    }

    #[test]
    fn update_writes_object_under_owner_key() {
        let objects = MemoryObjectStore::new();
        let table = MemoryTableStore::new("id");
        let stores = WidgetStores {
            objects: &objects,
            table: &table,
        };
        process_request(&create_body(), stores).expect("create should pass");

        let outcome = process_request(
            &body(json!({
                "type": "update",
                "widgetId": "w1",
                "otherAttributes": [{"name": "color", "value": "blue"}],
                "priority": "high"
            })),
            stores,
        )
        .expect("update should not error");

        assert_eq!(
            outcome,
            RequestOutcome::Updated {
                widget_id: "w1".to_string(),
                object_key: "widgets/jane-doe/w1".to_string(),
            }
        );
        let stored = objects
            .json("widgets/jane-doe/w1")
            .expect("object should exist");
        assert_eq!(stored["color"], json!("blue"));
        assert_eq!(stored["priority"], json!("high"));
        assert_eq!(stored["label"], json!("L"));
        assert!(stored.get("otherAttributes").is_none());
    }

    #[test]
    fn update_of_missing_widget_is_a_no_op() {
        let objects = MemoryObjectStore::new();
        let table = MemoryTableStore::new("id");
        let stores = WidgetStores {
            objects: &objects,
            table: &table,
        };

        let outcome = process_request(
            &body(json!({"type": "update", "widgetId": "ghost", "label": "x"})),
            stores,
        )
        .expect("update should not error");

        assert_eq!(
            outcome,
            RequestOutcome::NotFound {
                widget_id: "ghost".to_string()
            }
        );
        assert!(objects.keys().is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn update_store_failure_is_contained() {
        let objects = MemoryObjectStore::new();
        let table = UnavailableTable {
            calls: Cell::new(0),
        };
        let stores = WidgetStores {
            objects: &objects,
            table: &table,
        };

        let outcome = process_request(
            &body(json!({"type": "update", "widgetId": "w1", "label": "x"})),
            stores,
        )
        .expect("update failures should be contained");

        let RequestOutcome::StoreFailed { widget_id, error } = outcome else {
            panic!("expected store failure outcome");
        };
        assert_eq!(widget_id, "w1");
        assert!(error.contains("throttled"));
        assert_eq!(table.calls.get(), 1);
    }

    #[test]
    fn delete_removes_both_copies_and_repeats_cleanly() {
        let objects = MemoryObjectStore::new();
        let table = MemoryTableStore::new("id");
        let stores = WidgetStores {
            objects: &objects,
            table: &table,
        };
        process_request(&create_body(), stores).expect("create should pass");
        let delete = body(json!({"type": "delete", "widgetId": "w1", "owner": "Jane Doe"}));

        let first = process_request(&delete, stores).expect("delete should not error");
        assert_eq!(
            first,
            RequestOutcome::Deleted {
                widget_id: "w1".to_string(),
                object_key: "widgets/jane-doe/w1".to_string(),
                item_existed: true,
            }
        );
        assert!(objects.keys().is_empty());
        assert!(table.is_empty());

        let second = process_request(&delete, stores).expect("delete should not error");
        assert!(matches!(
            second,
            RequestOutcome::Deleted {
                item_existed: false,
                ..
            }
        ));
    }

    #[test]
    fn delete_without_owner_targets_empty_segment() {
        let objects = MemoryObjectStore::new();
        let table = MemoryTableStore::new("id");
        objects.seed_object("widgets//w1", b"{}");
        let stores = WidgetStores {
            objects: &objects,
            table: &table,
        };

        let outcome = process_request(&body(json!({"type": "delete", "widgetId": "w1"})), stores)
            .expect("delete should not error");

        assert!(matches!(
            outcome,
            RequestOutcome::Deleted { ref object_key, .. } if object_key == "widgets//w1"
        ));
        assert!(objects.keys().is_empty());
    }

    #[test]
    fn delete_attempts_both_stores_and_reports_failures() {
        let objects = FailingObjectStore;
        let table = UnavailableTable {
            calls: Cell::new(0),
        };
        let stores = WidgetStores {
            objects: &objects,
            table: &table,
        };

        let outcome = process_request(
            &body(json!({"type": "delete", "widgetId": "w1", "owner": "a"})),
            stores,
        )
        .expect("delete failures should be contained");

        let RequestOutcome::StoreFailed { error, .. } = outcome else {
            panic!("expected store failure outcome");
        };
        assert!(error.contains("delete_item"));
        assert!(error.contains("delete_object"));
    }

    #[test]
    fn unknown_type_is_ignored() {
        let objects = MemoryObjectStore::new();
        let table = MemoryTableStore::new("id");
        let stores = WidgetStores {
            objects: &objects,
            table: &table,
        };

        let outcome = process_request(&body(json!({"type": "archive", "widgetId": "w1"})), stores)
            .expect("unknown types should not error");

        assert_eq!(
            outcome,
            RequestOutcome::Ignored {
                request_type: "archive".to_string()
            }
        );
    }
}
