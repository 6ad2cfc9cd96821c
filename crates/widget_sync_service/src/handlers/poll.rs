use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::adapters::StoreError;
use crate::config::DispositionPolicy;
use crate::runtime::storage_keys::dead_letter_object_key;

use super::processor::{process_request, ProcessError, RequestOutcome, WidgetStores};
use super::source::{PendingRequest, RequestSource};

pub const DEFAULT_EMPTY_POLL_LIMIT: u32 = 10;
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Consecutive empty polls after which the loop stops.
    pub empty_poll_limit: u32,
    /// Sleep after each empty poll.
    pub idle_interval: Duration,
    pub on_malformed: DispositionPolicy,
    /// Applied when a create request fails to write.
    pub on_store_failure: DispositionPolicy,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            empty_poll_limit: DEFAULT_EMPTY_POLL_LIMIT,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            on_malformed: DispositionPolicy::Delete,
            on_store_failure: DispositionPolicy::Halt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The empty-poll limit was reached.
    Drained,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSummary {
    /// Requests removed from the source, whatever their outcome.
    pub consumed: usize,
    pub applied: usize,
    pub not_found: usize,
    pub rejected: usize,
    pub ignored: usize,
    pub store_failures: usize,
    pub dead_lettered: usize,
    pub stop_reason: StopReason,
}

impl PollSummary {
    fn new() -> Self {
        Self {
            consumed: 0,
            applied: 0,
            not_found: 0,
            rejected: 0,
            ignored: 0,
            store_failures: 0,
            dead_lettered: 0,
            stop_reason: StopReason::Drained,
        }
    }

    fn record(&mut self, outcome: &RequestOutcome) {
        match outcome {
            RequestOutcome::Created { .. }
            | RequestOutcome::Updated { .. }
            | RequestOutcome::Deleted { .. } => self.applied += 1,
            RequestOutcome::NotFound { .. } => self.not_found += 1,
            RequestOutcome::Rejected { .. } => self.rejected += 1,
            RequestOutcome::Ignored { .. } => self.ignored += 1,
            RequestOutcome::StoreFailed { .. } => self.store_failures += 1,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("failed to fetch the next request: {0}")]
    Source(#[source] StoreError),
    #[error("failed to remove request '{source_id}' from its source: {source}")]
    Acknowledge {
        source_id: String,
        source: StoreError,
    },
    #[error("failed to dead-letter request '{source_id}': {source}")]
    DeadLetter {
        source_id: String,
        source: StoreError,
    },
    #[error("halted on malformed request '{source_id}': {reason}")]
    Malformed { source_id: String, reason: String },
    #[error("halted on request '{source_id}': {source}")]
    Store {
        source_id: String,
        source: ProcessError,
    },
}

/// Drains `source` one request at a time until the empty-poll limit is hit
/// or `cancel` is set.
///
/// Each request is removed from its source once processing returns, unless
/// a `halt` disposition applies. There is no locking across consumers, so a
/// request can be applied twice; every handler tolerates that.
pub fn run_poll_loop(
    source: &mut dyn RequestSource,
    stores: WidgetStores<'_>,
    config: &PollConfig,
    cancel: &AtomicBool,
) -> Result<PollSummary, PollError> {
    let mut summary = PollSummary::new();
    let mut empty_polls = 0u32;

    while empty_polls < config.empty_poll_limit {
        if cancel.load(Ordering::Relaxed) {
            info!(consumed = summary.consumed, "poll loop cancelled");
            summary.stop_reason = StopReason::Cancelled;
            return Ok(summary);
        }

        let Some(request) = source.next_request().map_err(PollError::Source)? else {
            empty_polls += 1;
            debug!(empty_polls, "no pending request");
            thread::sleep(config.idle_interval);
            continue;
        };
        empty_polls = 0;

        dispatch(source, stores, config, &request, &mut summary)?;
    }

    info!(
        consumed = summary.consumed,
        applied = summary.applied,
        rejected = summary.rejected,
        dead_lettered = summary.dead_lettered,
        "no more requests found; exiting"
    );
    Ok(summary)
}

fn dispatch(
    source: &mut dyn RequestSource,
    stores: WidgetStores<'_>,
    config: &PollConfig,
    request: &PendingRequest,
    summary: &mut PollSummary,
) -> Result<(), PollError> {
    match process_request(&request.body, stores) {
        Ok(outcome) => {
            summary.record(&outcome);
            if let RequestOutcome::Rejected { reason } = outcome {
                match config.on_malformed {
                    DispositionPolicy::Halt => {
                        return Err(PollError::Malformed {
                            source_id: request.source_id.clone(),
                            reason,
                        });
                    }
                    DispositionPolicy::DeadLetter => dead_letter(stores, request, summary)?,
                    DispositionPolicy::Delete => {}
                }
            }
        }
        Err(process_error) => {
            summary.store_failures += 1;
            error!(
                source_id = %request.source_id,
                error = %process_error,
                "request failed to apply"
            );
            match config.on_store_failure {
                DispositionPolicy::Halt => {
                    return Err(PollError::Store {
                        source_id: request.source_id.clone(),
                        source: process_error,
                    });
                }
                DispositionPolicy::DeadLetter => dead_letter(stores, request, summary)?,
                DispositionPolicy::Delete => {
                    warn!(source_id = %request.source_id, "dropping failed request");
                }
            }
        }
    }

    source
        .acknowledge(request)
        .map_err(|source_error| PollError::Acknowledge {
            source_id: request.source_id.clone(),
            source: source_error,
        })?;
    summary.consumed += 1;
    info!(source_id = %request.source_id, "processed and deleted request");
    Ok(())
}

fn dead_letter(
    stores: WidgetStores<'_>,
    request: &PendingRequest,
    summary: &mut PollSummary,
) -> Result<(), PollError> {
    let key = dead_letter_object_key(&request.source_id);
    stores
        .objects
        .put_object(&key, &request.body)
        .map_err(|store_error| PollError::DeadLetter {
            source_id: request.source_id.clone(),
            source: store_error,
        })?;
    summary.dead_lettered += 1;
    warn!(source_id = %request.source_id, object_key = %key, "dead-lettered request");
    Ok(())
}
