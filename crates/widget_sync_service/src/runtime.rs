//! Domain primitives re-exported from `widget_sync_core`.

pub use widget_sync_core::{contract, flatten, storage_keys, widget};
