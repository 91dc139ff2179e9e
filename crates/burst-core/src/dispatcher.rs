use crate::error::DispatchError;
use crate::executor::RequestExecutor;
use crate::model::BatchResult;
use crate::session::SessionFactory;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Fans a batch out to `size` concurrent requests and joins all of them.
///
/// Every request of a batch is launched at once: the batch size is the
/// concurrency level. The dispatcher waits for each request to finish or
/// fail before computing the batch statistics.
#[derive(Clone)]
pub struct BatchDispatcher {
    sessions: Arc<dyn SessionFactory>,
    executor: RequestExecutor,
}

impl BatchDispatcher {
    pub fn new(sessions: Arc<dyn SessionFactory>, executor: RequestExecutor) -> Self {
        Self { sessions, executor }
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn session_kind(&self) -> &'static str {
        self.sessions.name()
    }

    pub async fn dispatch(&self, size: usize) -> Result<BatchResult, DispatchError> {
        let last_id = u32::try_from(size).map_err(|_| DispatchError::TooLarge(size))?;
        let session = self.sessions.open()?;
        debug!(size, session = self.sessions.name(), "opened batch session");

        let batch_start = Utc::now();
        let started = Instant::now();

        let handles: Vec<_> = (1..=last_id)
            .map(|request_id| {
                let executor = self.executor.clone();
                let session = session.clone();
                tokio::spawn(async move { executor.execute(session.as_ref(), request_id).await })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(size);
        let mut task_failure = None;
        for (idx, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                // Keep joining the rest; siblings are never cancelled.
                Err(source) if task_failure.is_none() => {
                    task_failure = Some(DispatchError::Task {
                        request_id: idx as u32 + 1,
                        source,
                    });
                }
                Err(source) => warn!(request_id = idx + 1, error = %source, "request task failed"),
            }
        }

        let elapsed = started.elapsed();
        let batch_end = Utc::now();
        drop(session);

        if let Some(err) = task_failure {
            return Err(err);
        }

        let batch = BatchResult::from_outcomes(size, batch_start, batch_end, elapsed, outcomes);
        info!(
            size,
            successful = batch.successful_count,
            failed = batch.failed_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "batch complete"
        );
        Ok(batch)
    }
}
