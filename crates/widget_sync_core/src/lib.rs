//! Shared widget change-request domain primitives.
//!
//! This crate owns request parsing, attribute flattening, the widget record
//! merge, and storage key derivation. It intentionally excludes AWS SDK and
//! runtime concerns.
//! See `crates/widget_sync_core/README.md` for ownership boundaries.

pub mod contract;
pub mod flatten;
pub mod storage_keys;
pub mod widget;
