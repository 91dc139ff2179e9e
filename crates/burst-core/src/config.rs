use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-request timeout applied to the whole exchange, body read included.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
/// Escalating burst sizes of a standard run.
pub const DEFAULT_BATCH_SIZES: [usize; 3] = [5, 10, 20];
/// Pause between consecutive batches.
pub const DEFAULT_PAUSE_MS: u64 = 2_000;
pub const DEFAULT_RESULTS_DIR: &str = "results";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub plan: PlanConfig,
    pub output: OutputConfig,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Webhook URL; prompted for interactively when absent
    pub url: Option<String>,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl TargetConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Batch sizes, run strictly in order
    pub batch_sizes: Vec<usize>,
    /// Pause between batches in milliseconds
    pub pause_ms: u64,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            batch_sizes: DEFAULT_BATCH_SIZES.to_vec(),
            pause_ms: DEFAULT_PAUSE_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub results_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serde() {
        let config_str = r#"
[target]
url = "http://localhost:5678/webhook/abc123"
timeout_ms = 5000

[plan]
batch_sizes = [1, 2]
pause_ms = 100

[output]
results_dir = "out"
        "#;

        let config: Config = toml::from_str(config_str).unwrap();
        assert_eq!(
            config.target.url.as_deref(),
            Some("http://localhost:5678/webhook/abc123")
        );
        assert_eq!(config.target.timeout(), Duration::from_secs(5));
        assert_eq!(config.plan.batch_sizes, vec![1, 2]);
        assert_eq!(config.plan.pause_ms, 100);
        assert_eq!(config.output.results_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = toml::from_str("[target]\nurl = \"https://x.test/hook\"\n").unwrap();
        assert_eq!(config.target.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.plan.batch_sizes, vec![5, 10, 20]);
        assert_eq!(config.plan.pause_ms, 2_000);
        assert_eq!(config.output.results_dir, PathBuf::from("results"));

        let empty: Config = toml::from_str("").unwrap();
        assert_eq!(empty, Config::default());
    }
}
