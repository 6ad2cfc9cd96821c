//! AWS-oriented adapters and handlers for widget change-request processing.
//!
//! This crate owns runtime integration details (store and queue adapters, the
//! poll loop, the intake Lambda) and exposes a single runtime module boundary
//! for contract, flattening, widget and storage key primitives.
//! See `crates/widget_sync_service/README.md` for ownership boundaries.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod logging;
pub mod runtime;
