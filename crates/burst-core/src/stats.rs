use crate::model::BatchResult;
use serde::{Deserialize, Serialize};

/// Decimal places kept for durations (seconds).
pub const DURATION_PLACES: i32 = 4;
/// Decimal places kept for rates and percentages.
pub const RATE_PLACES: i32 = 2;

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Percentage of `successful` over `total`, 0 when there is nothing to divide.
pub fn success_rate_percent(successful: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to(successful as f64 / total as f64 * 100.0, RATE_PLACES)
}

/// Requests per second over `seconds`, 0 for an empty or negative window.
pub fn throughput(requests: usize, seconds: f64) -> f64 {
    if seconds <= 0.0 {
        return 0.0;
    }
    round_to(requests as f64 / seconds, RATE_PLACES)
}

/// Min/max/mean/median over a set of request durations, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Element at `len / 2` of the sorted sample: the upper-middle one for
    /// even counts. Kept for compatibility with earlier result files.
    pub median: f64,
}

impl DurationStats {
    pub fn from_durations(durations: &[f64]) -> Self {
        if durations.is_empty() {
            return Self::default();
        }

        let mut sorted = durations.to_vec();
        sorted.sort_by(f64::total_cmp);

        let len = sorted.len();
        let sum: f64 = sorted.iter().sum();

        Self {
            min: round_to(sorted[0], DURATION_PLACES),
            max: round_to(sorted[len - 1], DURATION_PLACES),
            mean: round_to(sum / len as f64, DURATION_PLACES),
            median: round_to(sorted[len / 2], DURATION_PLACES),
        }
    }
}

/// Run-level statistics over the union of every batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_requests: usize,
    pub total_successful: usize,
    pub total_failed: usize,
    pub overall_success_rate_percent: f64,
    /// Sum of batch durations; pauses between batches are not counted.
    pub total_duration: f64,
    pub overall_requests_per_second: f64,
    pub stats: DurationStats,
}

impl RunStats {
    /// Computes run statistics by flattening every batch's outcomes.
    pub fn from_batches(batches: &[BatchResult]) -> Self {
        let durations: Vec<f64> = batches
            .iter()
            .flat_map(|b| b.outcomes.iter().map(|o| o.duration))
            .collect();

        Self::from_parts(
            batches.iter().map(|b| b.requested_size).sum(),
            batches.iter().map(|b| b.successful_count).sum(),
            batches.iter().map(|b| b.failed_count).sum(),
            batches.iter().map(|b| b.total_duration).sum(),
            &durations,
        )
    }

    fn from_parts(
        total_requests: usize,
        total_successful: usize,
        total_failed: usize,
        total_duration: f64,
        durations: &[f64],
    ) -> Self {
        Self {
            total_requests,
            total_successful,
            total_failed,
            overall_success_rate_percent: success_rate_percent(total_successful, total_requests),
            total_duration: round_to(total_duration, DURATION_PLACES),
            overall_requests_per_second: throughput(total_requests, total_duration),
            stats: DurationStats::from_durations(durations),
        }
    }
}

/// Incremental run statistics, fed one finished batch at a time.
#[derive(Debug, Clone, Default)]
pub struct StatsCollector {
    pub total_requests: usize,
    pub total_successful: usize,
    pub total_failed: usize,
    total_duration: f64,
    durations: Vec<f64>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_batch(&mut self, batch: &BatchResult) {
        self.total_requests += batch.requested_size;
        self.total_successful += batch.successful_count;
        self.total_failed += batch.failed_count;
        self.total_duration += batch.total_duration;
        self.durations
            .extend(batch.outcomes.iter().map(|o| o.duration));
    }

    pub fn summary(&self) -> RunStats {
        RunStats::from_parts(
            self.total_requests,
            self.total_successful,
            self.total_failed,
            self.total_duration,
            &self.durations,
        )
    }
}
