use crate::dispatcher::BatchDispatcher;
use crate::error::RunError;
use crate::model::{BatchResult, RunResult};
use crate::plan::BatchPlan;
use chrono::Utc;
use tokio::time::sleep;
use tracing::{info, warn};

/// Runs the batches of a plan strictly in sequence against one target.
pub struct RunOrchestrator {
    dispatcher: BatchDispatcher,
    plan: BatchPlan,
}

impl RunOrchestrator {
    pub fn new(dispatcher: BatchDispatcher, plan: BatchPlan) -> Self {
        Self { dispatcher, plan }
    }

    pub fn plan(&self) -> &BatchPlan {
        &self.plan
    }

    pub fn target(&self) -> &str {
        self.dispatcher.executor().target()
    }

    pub async fn run(&self) -> Result<RunResult, RunError> {
        self.run_observed(|_, _| {}).await
    }

    /// Like [`run`](Self::run), calling `on_batch` with the batch index and
    /// result as soon as each batch has been joined.
    pub async fn run_observed<F>(&self, mut on_batch: F) -> Result<RunResult, RunError>
    where
        F: FnMut(usize, &BatchResult),
    {
        let run_timestamp = Utc::now();
        let mut batches: Vec<BatchResult> = Vec::with_capacity(self.plan.sizes().len());

        info!(
            target_url = self.target(),
            session = self.dispatcher.session_kind(),
            batches = self.plan.sizes().len(),
            total_requests = self.plan.total_requests(),
            "starting run"
        );

        for (idx, &size) in self.plan.sizes().iter().enumerate() {
            info!("Starting batch {}: {} parallel requests", idx + 1, size);

            let batch = match self.dispatcher.dispatch(size).await {
                Ok(batch) => batch,
                Err(source) => {
                    warn!(batch = idx + 1, size, error = %source, "batch failed, aborting run");
                    return Err(RunError::Interrupted {
                        batch_index: idx,
                        requested_size: size,
                        completed: batches,
                        source,
                    });
                }
            };

            on_batch(idx, &batch);
            batches.push(batch);

            if self.plan.pause_after(idx) {
                sleep(self.plan.pause()).await;
            }
        }

        let result = RunResult::new(self.target(), run_timestamp, batches);
        info!(
            total_requests = result.overall.total_requests,
            successful = result.overall.total_successful,
            success_rate = result.overall.overall_success_rate_percent,
            "run complete"
        );
        Ok(result)
    }
}
