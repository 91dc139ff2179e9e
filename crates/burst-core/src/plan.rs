use crate::config::PlanConfig;
use std::time::Duration;

/// Ordered batch plan: batches run strictly in order, one at a time,
/// with a fixed pause between consecutive batches.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    sizes: Vec<usize>,
    pause: Duration,
}

impl BatchPlan {
    pub fn new(sizes: Vec<usize>, pause: Duration) -> Self {
        Self { sizes, pause }
    }

    pub fn from_config(config: &PlanConfig) -> Self {
        Self::new(
            config.batch_sizes.clone(),
            Duration::from_millis(config.pause_ms),
        )
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Total number of requests across every batch.
    pub fn total_requests(&self) -> usize {
        self.sizes.iter().sum()
    }

    /// Whether a pause follows the batch at `idx` (never after the last one).
    pub fn pause_after(&self, idx: usize) -> bool {
        idx + 1 < self.sizes.len()
    }

    /// Time spent pausing between batches over the whole run.
    pub fn total_pause(&self) -> Duration {
        let gaps = self.sizes.len().saturating_sub(1) as u32;
        self.pause * gaps
    }
}

impl Default for BatchPlan {
    fn default() -> Self {
        Self::from_config(&PlanConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan() {
        let plan = BatchPlan::default();
        assert_eq!(plan.sizes(), &[5, 10, 20]);
        assert_eq!(plan.pause(), Duration::from_secs(2));
        assert_eq!(plan.total_requests(), 35);
        assert_eq!(plan.total_pause(), Duration::from_secs(4));
    }

    #[test]
    fn test_pause_after() {
        let plan = BatchPlan::new(vec![5, 5, 5], Duration::from_millis(10));
        assert!(plan.pause_after(0));
        assert!(plan.pause_after(1));
        assert!(!plan.pause_after(2));
    }

    #[test]
    fn test_empty_plan() {
        let plan = BatchPlan::new(vec![], Duration::from_secs(2));
        assert!(plan.is_empty());
        assert_eq!(plan.total_requests(), 0);
        assert_eq!(plan.total_pause(), Duration::ZERO);
    }
}
