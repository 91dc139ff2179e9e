use crate::error::SendError;
use crate::session::Exchange;
use crate::stats::{
    round_to, success_rate_percent, throughput, DurationStats, RunStats, DURATION_PLACES,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Status codes counted as a successful delivery.
pub const ACCEPTED_STATUS: [u16; 4] = [200, 201, 202, 204];
/// Maximum number of characters kept from a response body.
pub const PREVIEW_CHARS: usize = 200;

pub fn is_accepted_status(status: u16) -> bool {
    ACCEPTED_STATUS.contains(&status)
}

/// Wall-clock bounds of one request plus its monotonic elapsed time.
#[derive(Debug, Clone, Copy)]
pub struct RequestTiming {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub request_id: u32,
    pub correlation_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Seconds
    pub duration: f64,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub succeeded: bool,
    pub response_preview: Option<String>,
}

impl RequestOutcome {
    pub fn new(
        request_id: u32,
        correlation_id: String,
        timing: RequestTiming,
        result: Result<Exchange, SendError>,
    ) -> Self {
        let (status_code, error, response_preview) = match result {
            Ok(exchange) => (Some(exchange.status), None, exchange.body.and_then(preview)),
            Err(e) => (None, Some(e.to_string()), None),
        };
        let succeeded = error.is_none() && status_code.is_some_and(is_accepted_status);

        Self {
            request_id,
            correlation_id,
            start_time: timing.start_time,
            end_time: timing.end_time,
            duration: round_to(timing.elapsed.as_secs_f64(), DURATION_PLACES),
            status_code,
            error,
            succeeded,
            response_preview,
        }
    }
}

fn preview(body: String) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    Some(body.chars().take(PREVIEW_CHARS).collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub requested_size: usize,
    pub batch_start: DateTime<Utc>,
    pub batch_end: DateTime<Utc>,
    /// Seconds from fan-out to the last join
    pub total_duration: f64,
    pub requests_per_second: f64,
    pub successful_count: usize,
    pub failed_count: usize,
    pub success_rate_percent: f64,
    pub outcomes: Vec<RequestOutcome>,
    pub stats: DurationStats,
}

impl BatchResult {
    pub fn from_outcomes(
        requested_size: usize,
        batch_start: DateTime<Utc>,
        batch_end: DateTime<Utc>,
        elapsed: Duration,
        outcomes: Vec<RequestOutcome>,
    ) -> Self {
        let elapsed_secs = elapsed.as_secs_f64();
        let successful_count = outcomes.iter().filter(|o| o.succeeded).count();
        let durations: Vec<f64> = outcomes.iter().map(|o| o.duration).collect();

        Self {
            requested_size,
            batch_start,
            batch_end,
            total_duration: round_to(elapsed_secs, DURATION_PLACES),
            requests_per_second: throughput(requested_size, elapsed_secs),
            successful_count,
            failed_count: requested_size.saturating_sub(successful_count),
            success_rate_percent: success_rate_percent(successful_count, requested_size),
            stats: DurationStats::from_durations(&durations),
            outcomes,
        }
    }

    pub fn all_failed(&self) -> bool {
        self.requested_size > 0 && self.successful_count == 0
    }

    /// One diagnostic for a batch where nothing succeeded, derived from the
    /// first outcome.
    pub fn failure_hint(&self) -> Option<FailureHint> {
        if !self.all_failed() {
            return None;
        }
        let first = self.outcomes.first()?;
        match (first.status_code, first.error.as_deref()) {
            (Some(404), _) => Some(FailureHint::NotFound),
            (_, Some(error)) => Some(FailureHint::Error(error.to_string())),
            (Some(status), None) => Some(FailureHint::Status(status)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureHint {
    NotFound,
    Status(u16),
    Error(String),
}

impl fmt::Display for FailureHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureHint::NotFound => write!(
                f,
                "All requests returned 404. The webhook path may not be registered, \
                 the workflow may be inactive, or the URL may need a different path"
            ),
            FailureHint::Status(status) => {
                write!(f, "All requests returned non-accepted status {status}")
            }
            FailureHint::Error(error) => write!(f, "Error: {error}"),
        }
    }
}

/// Root aggregate of one run. `overall` is always derived from `batches`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub target_identifier: String,
    pub run_timestamp: DateTime<Utc>,
    pub batches: Vec<BatchResult>,
    pub overall: RunStats,
}

impl RunResult {
    pub fn new(
        target_identifier: impl Into<String>,
        run_timestamp: DateTime<Utc>,
        batches: Vec<BatchResult>,
    ) -> Self {
        let overall = RunStats::from_batches(&batches);
        Self {
            target_identifier: target_identifier.into(),
            run_timestamp,
            batches,
            overall,
        }
    }

    /// True when `overall` matches a fresh aggregation of `batches`.
    pub fn is_consistent(&self) -> bool {
        RunStats::from_batches(&self.batches) == self.overall
    }
}
