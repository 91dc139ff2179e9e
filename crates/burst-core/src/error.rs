//! Error types for the burst-core library.
//!
//! Per-request failures are not errors here: they are recorded on the
//! [`RequestOutcome`](crate::model::RequestOutcome). Only failures that stop
//! a batch or a run from producing a result surface as `Err`.

use crate::model::BatchResult;
use std::path::PathBuf;
use std::time::Duration;

/// Why a single exchange with the target did not complete.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SendError {
    #[error("Timeout after {}", timeout_label(.0))]
    Timeout(Duration),

    #[error("{0}")]
    Transport(String),
}

fn timeout_label(timeout: &Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        format!("{} seconds", timeout.as_secs())
    } else {
        format!("{} ms", timeout.as_millis())
    }
}

impl SendError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SendError::Timeout(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to open client session: {0}")]
    Session(String),

    #[error("Batch size {0} exceeds the maximum of {max} requests", max = u32::MAX)]
    TooLarge(usize),

    #[error("Request task {request_id} failed: {source}")]
    Task {
        request_id: u32,
        #[source]
        source: tokio::task::JoinError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Run interrupted at batch index {batch_index} (size {requested_size}) after {} completed batch(es): {source}", .completed.len())]
    Interrupted {
        batch_index: usize,
        requested_size: usize,
        completed: Vec<BatchResult>,
        #[source]
        source: DispatchError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
