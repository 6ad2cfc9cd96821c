use std::fmt::Display;
use std::future::Future;

pub mod memory;
pub mod object_store;
pub mod queue;
pub mod table_store;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{operation} failed for '{target}': {message}")]
    Backend {
        operation: &'static str,
        target: String,
        message: String,
    },
    #[error("stored item '{key}' could not be decoded: {message}")]
    InvalidItem { key: String, message: String },
}

impl StoreError {
    pub fn backend(operation: &'static str, target: impl Into<String>, error: impl Display) -> Self {
        Self::Backend {
            operation,
            target: target.into(),
            message: error.to_string(),
        }
    }

    pub fn invalid_item(key: impl Into<String>, error: impl Display) -> Self {
        Self::InvalidItem {
            key: key.into(),
            message: error.to_string(),
        }
    }
}

/// Runs an SDK future to completion from synchronous port code.
///
/// Must be called from inside a multi-threaded tokio runtime.
pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
