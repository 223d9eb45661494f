//! Status-polling policy: delays, bounds, and response classification.
//!
//! A freshly uploaded analysis may not be visible to every backend
//! worker yet, so an early 404 is expected latency, not loss. A 404
//! long after upload means the record is gone (e.g. a backend restart)
//! and the job must be resubmitted. The grace window and bounded retry
//! counts below encode that distinction; transient failures (5xx,
//! network, parse) get their own counter and backoff.

use std::time::Duration;

use crate::api::{AnalysisStatusResponse, GaitApiError};

/// Tunable parameters for the poll loop.
///
/// [`Default`] carries the production constants; tests inject
/// millisecond-scale values.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before the first poll, absorbing backend
    /// eventual-visibility latency.
    pub initial_delay: Duration,
    /// Interval between polls while the analysis is processing.
    pub interval: Duration,
    /// Time span after polling starts during which a 404 is treated as
    /// "not yet visible" rather than loss.
    pub grace_window: Duration,
    /// Base delay for not-yet-visible retries; grows linearly with the
    /// attempt count.
    pub not_found_base_delay: Duration,
    /// Bound on not-yet-visible retries, inside the grace window or out.
    pub max_not_found_attempts: u32,
    /// Base delay for transient-error retries; grows with the number
    /// of consecutive errors.
    pub error_base_delay: Duration,
    /// Consecutive transient errors tolerated before giving up.
    pub max_consecutive_errors: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            interval: Duration::from_secs(1),
            grace_window: Duration::from_secs(10),
            not_found_base_delay: Duration::from_millis(500),
            max_not_found_attempts: 5,
            error_base_delay: Duration::from_secs(3),
            max_consecutive_errors: 5,
        }
    }
}

/// Delay before not-yet-visible retry number `attempt` (1-based).
pub fn not_found_delay(attempt: u32, config: &PollConfig) -> Duration {
    config.not_found_base_delay * attempt
}

/// Backoff delay after `consecutive` transient errors (1-based).
pub fn error_delay(consecutive: u32, config: &PollConfig) -> Duration {
    config.error_base_delay * consecutive
}

/// How the poll loop should react to one poll attempt.
#[derive(Debug)]
pub(crate) enum PollOutcome {
    /// The backend answered; the body drives the state machine.
    Status(AnalysisStatusResponse),
    /// HTTP 404: the record is not (or no longer) visible.
    NotFound,
    /// Anything else that went wrong: non-404 HTTP error, network
    /// failure, or an unparseable body.
    Transient(String),
}

/// Classify the result of one status request.
pub(crate) fn classify(result: Result<AnalysisStatusResponse, GaitApiError>) -> PollOutcome {
    match result {
        Ok(response) => PollOutcome::Status(response),
        Err(e) if e.is_not_found() => PollOutcome::NotFound,
        Err(e) => PollOutcome::Transient(e.to_string()),
    }
}
