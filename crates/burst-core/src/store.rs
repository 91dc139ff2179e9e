use crate::config::DEFAULT_RESULTS_DIR;
use crate::error::StoreError;
use crate::model::RunResult;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::info;

/// Results directory holding persisted run documents.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `result` as pretty JSON, creating the directory if absent.
    /// Without a `filename`, one is derived from the run timestamp.
    pub fn save(&self, result: &RunResult, filename: Option<&str>) -> Result<PathBuf, StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let filename = match filename {
            Some(name) => with_json_extension(name),
            None => default_filename(result.run_timestamp),
        };
        let path = self.dir.join(filename);

        let json = serde_json::to_string_pretty(result).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        info!("Results written to {}", path.display());
        Ok(path)
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<RunResult, StoreError> {
        self.load_as(path)
    }

    /// Loads any JSON document, resolving `path` against the results
    /// directory first.
    pub fn load_as<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T, StoreError> {
        let path = self.resolve(path)?;
        let contents = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| StoreError::Json { path, source })
    }

    /// Returns `path` as given when it exists; otherwise a relative path is
    /// looked up under the results directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf, StoreError> {
        let path = path.as_ref();
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        if path.is_relative() {
            let candidate = self.dir.join(path);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(StoreError::NotFound(path.to_path_buf()))
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new(DEFAULT_RESULTS_DIR)
    }
}

pub fn default_filename(timestamp: DateTime<Utc>) -> String {
    format!("webhook_test_{}.json", timestamp.format("%Y%m%d_%H%M%S"))
}

fn with_json_extension(name: &str) -> String {
    if name.ends_with(".json") {
        name.to_string()
    } else {
        format!("{name}.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{failed_outcome, ok_outcome};
    use crate::model::BatchResult;
    use chrono::TimeZone;
    use std::time::Duration;

    fn sample_run() -> RunResult {
        let start = Utc::now();
        let end = start + chrono::Duration::milliseconds(734);
        let batches = vec![
            BatchResult::from_outcomes(
                3,
                start,
                end,
                Duration::from_micros(734_118),
                vec![
                    ok_outcome(1, 0.123456),
                    failed_outcome(2, 0.7, "connection reset by peer"),
                    ok_outcome(3, 0.333333),
                ],
            ),
            BatchResult::from_outcomes(
                1,
                end,
                end,
                Duration::from_micros(101_010),
                vec![ok_outcome(1, 0.1)],
            ),
        ];
        RunResult::new("https://example.test/webhook/abc", start, batches)
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResultStore::new(tmp.path().join("results"));
        let run = sample_run();

        let path = store.save(&run, None).unwrap();
        assert!(path.starts_with(store.dir()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("json"));

        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded, run);
        assert!(loaded.is_consistent());
    }

    #[test]
    fn test_save_appends_json_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResultStore::new(tmp.path());

        let path = store.save(&sample_run(), Some("baseline")).unwrap();
        assert_eq!(path, tmp.path().join("baseline.json"));

        let path = store.save(&sample_run(), Some("second.json")).unwrap();
        assert_eq!(path, tmp.path().join("second.json"));
    }

    #[test]
    fn test_resolve_falls_back_to_results_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResultStore::new(tmp.path());
        store.save(&sample_run(), Some("run_a")).unwrap();

        let resolved = store.resolve("run_a.json").unwrap();
        assert_eq!(resolved, tmp.path().join("run_a.json"));

        let err = store.resolve("missing.json").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_load_invalid_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ResultStore::new(tmp.path()).load(&path).unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
        assert!(err.to_string().starts_with("Invalid JSON in"));
    }

    #[test]
    fn test_default_filename() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 5, 14, 30, 0).unwrap();
        assert_eq!(default_filename(ts), "webhook_test_20250105_143000.json");
    }
}
