//! Cross-run comparison of persisted results.
//!
//! Documents are read through a lenient snapshot model: every field is
//! optional and a missing or `null` value reads as zero. Field names written
//! by earlier versions of the tool are accepted as aliases, so results from
//! before and after a schema change can be diffed against each other.

use crate::error::StoreError;
use crate::store::ResultStore;
use serde::{Deserialize, Deserializer};
use std::path::Path;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunSnapshot {
    #[serde(alias = "webhook_url", deserialize_with = "null_as_default")]
    pub target_identifier: String,
    #[serde(alias = "test_timestamp", deserialize_with = "null_as_default")]
    pub run_timestamp: String,
    #[serde(alias = "test_batches", deserialize_with = "null_as_default")]
    pub batches: Vec<BatchSnapshot>,
    #[serde(alias = "overall_statistics", deserialize_with = "null_as_default")]
    pub overall: OverallSnapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BatchSnapshot {
    #[serde(alias = "batch_size", deserialize_with = "null_as_default")]
    pub requested_size: u64,
    #[serde(
        alias = "batch_total_duration_seconds",
        deserialize_with = "null_as_default"
    )]
    pub total_duration: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub requests_per_second: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub success_rate_percent: f64,
    #[serde(alias = "statistics", deserialize_with = "null_as_default")]
    pub stats: StatsSnapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OverallSnapshot {
    #[serde(deserialize_with = "null_as_default")]
    pub total_requests: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub overall_success_rate_percent: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub overall_requests_per_second: f64,
    #[serde(
        alias = "total_test_duration_seconds",
        deserialize_with = "null_as_default"
    )]
    pub total_duration: f64,
    #[serde(
        alias = "individual_request_statistics",
        deserialize_with = "null_as_default"
    )]
    pub stats: StatsSnapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StatsSnapshot {
    #[serde(alias = "min_duration_seconds", deserialize_with = "null_as_default")]
    pub min: f64,
    #[serde(alias = "max_duration_seconds", deserialize_with = "null_as_default")]
    pub max: f64,
    #[serde(alias = "avg_duration_seconds", deserialize_with = "null_as_default")]
    pub mean: f64,
    #[serde(alias = "median_duration_seconds", deserialize_with = "null_as_default")]
    pub median: f64,
}

/// Loads a run document, looking under the store's directory when `path`
/// does not exist as given.
pub fn load_snapshot(store: &ResultStore, path: impl AsRef<Path>) -> Result<RunSnapshot, StoreError> {
    store.load_as(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
    Informational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    TotalRequests,
    SuccessRate,
    Throughput,
    MeanDuration,
    TotalDuration,
    MinDuration,
    MaxDuration,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::TotalRequests => "Total Requests",
            Metric::SuccessRate => "Success Rate",
            Metric::Throughput => "Throughput",
            Metric::MeanDuration => "Average Request Duration",
            Metric::TotalDuration => "Total Time",
            Metric::MinDuration => "Min Request Duration",
            Metric::MaxDuration => "Max Request Duration",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::TotalRequests => "",
            Metric::SuccessRate => "%",
            Metric::Throughput => " req/s",
            Metric::MeanDuration
            | Metric::TotalDuration
            | Metric::MinDuration
            | Metric::MaxDuration => "s",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Metric::SuccessRate | Metric::Throughput => Direction::HigherIsBetter,
            Metric::MeanDuration | Metric::TotalDuration => Direction::LowerIsBetter,
            Metric::TotalRequests | Metric::MinDuration | Metric::MaxDuration => {
                Direction::Informational
            }
        }
    }
}

/// Signed change of one metric, second run minus first run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricDelta {
    pub metric: Metric,
    pub first: f64,
    pub second: f64,
    pub difference: f64,
}

impl MetricDelta {
    pub fn new(metric: Metric, first: f64, second: f64) -> Self {
        Self {
            metric,
            first,
            second,
            difference: second - first,
        }
    }

    /// `None` for informational metrics.
    pub fn favorable(&self) -> Option<bool> {
        match self.metric.direction() {
            Direction::HigherIsBetter => Some(self.difference >= 0.0),
            Direction::LowerIsBetter => Some(self.difference <= 0.0),
            Direction::Informational => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchComparison {
    pub position: usize,
    pub requested_size: u64,
    pub deltas: Vec<MetricDelta>,
}

impl BatchComparison {
    pub fn delta(&self, metric: Metric) -> Option<&MetricDelta> {
        self.deltas.iter().find(|d| d.metric == metric)
    }
}

/// Position-aligned batch pair that was not compared because sizes differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBatch {
    pub position: usize,
    pub first_size: u64,
    pub second_size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub overall: Vec<MetricDelta>,
    pub batches: Vec<BatchComparison>,
    pub skipped: Vec<SkippedBatch>,
}

impl Comparison {
    pub fn overall_delta(&self, metric: Metric) -> Option<&MetricDelta> {
        self.overall.iter().find(|d| d.metric == metric)
    }
}

pub fn compare_runs(first: &RunSnapshot, second: &RunSnapshot) -> Comparison {
    let (a, b) = (&first.overall, &second.overall);
    let overall = vec![
        MetricDelta::new(
            Metric::TotalRequests,
            a.total_requests as f64,
            b.total_requests as f64,
        ),
        MetricDelta::new(
            Metric::SuccessRate,
            a.overall_success_rate_percent,
            b.overall_success_rate_percent,
        ),
        MetricDelta::new(
            Metric::Throughput,
            a.overall_requests_per_second,
            b.overall_requests_per_second,
        ),
        MetricDelta::new(Metric::MeanDuration, a.stats.mean, b.stats.mean),
        MetricDelta::new(Metric::TotalDuration, a.total_duration, b.total_duration),
        MetricDelta::new(Metric::MinDuration, a.stats.min, b.stats.min),
        MetricDelta::new(Metric::MaxDuration, a.stats.max, b.stats.max),
    ];

    let mut batches = Vec::new();
    let mut skipped = Vec::new();
    for (position, (x, y)) in first.batches.iter().zip(&second.batches).enumerate() {
        if x.requested_size != y.requested_size {
            skipped.push(SkippedBatch {
                position,
                first_size: x.requested_size,
                second_size: y.requested_size,
            });
            continue;
        }
        batches.push(BatchComparison {
            position,
            requested_size: x.requested_size,
            deltas: vec![
                MetricDelta::new(
                    Metric::SuccessRate,
                    x.success_rate_percent,
                    y.success_rate_percent,
                ),
                MetricDelta::new(
                    Metric::Throughput,
                    x.requests_per_second,
                    y.requests_per_second,
                ),
                MetricDelta::new(Metric::MeanDuration, x.stats.mean, y.stats.mean),
                MetricDelta::new(Metric::TotalDuration, x.total_duration, y.total_duration),
            ],
        });
    }

    Comparison {
        overall,
        batches,
        skipped,
    }
}
