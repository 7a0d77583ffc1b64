//! The append-only report log.
//!
//! Each vision analysis is recorded as an immutable [`Report`] with a
//! monotonically increasing id. The log exposes `append` and `latest`
//! only; entries are never edited or deleted. Appends are serialized by a
//! lock distinct from the state store's, so state access and report
//! appends never contend with each other.

use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::{AnalysisResult, Report, ReportItem};
use crate::storage::{Backend, JsonFileBackend, StoreError};

/// On-disk shape of the log: one document wrapping the report sequence.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ReportFile {
    #[serde(default)]
    reports: Vec<Report>,
}

pub struct ReportLog {
    backend: Box<dyn Backend>,
    lock: Mutex<()>,
}

impl ReportLog {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            lock: Mutex::new(()),
        }
    }

    pub fn json_file(path: impl Into<std::path::PathBuf>) -> Self {
        Self::new(Box::new(JsonFileBackend::new(path)))
    }

    fn read_unlocked(&self) -> Result<ReportFile, StoreError> {
        match self.backend.load()? {
            Some(doc) => Ok(serde_json::from_value(doc)?),
            None => Ok(ReportFile::default()),
        }
    }

    /// Writes an empty log document if none exists yet.
    pub fn initialize(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.backend.load()?.is_none() {
            self.backend
                .store(&serde_json::to_value(ReportFile::default())?)?;
        }
        Ok(())
    }

    /// Durably appends an analysis result and returns the new report id.
    ///
    /// `ideal`/`current` are coerced to integer-or-null (non-integer model
    /// output becomes null, never rejected). Id assignment and the durable
    /// append happen as one atomic unit inside the log's lock, so no two
    /// appends can observe the same next id. Prior entries are never
    /// mutated.
    pub fn append(&self, result: &AnalysisResult) -> Result<i64, StoreError> {
        let inventory: Vec<ReportItem> = result
            .inventory
            .iter()
            .map(|item| ReportItem {
                name: item.name.clone(),
                ideal: item.ideal.as_i64(),
                current: item.current.as_i64(),
            })
            .collect();

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = self.read_unlocked()?;
        let next_id = file.reports.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        file.reports.push(Report {
            id: next_id,
            created_at: Utc::now(),
            notes: result.notes.clone(),
            inventory,
        });
        self.backend.store(&serde_json::to_value(&file)?)?;
        Ok(next_id)
    }

    /// Returns the highest-id report, or `None` when the log is empty.
    pub fn latest(&self) -> Result<Option<Report>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let file = self.read_unlocked()?;
        Ok(file.reports.into_iter().max_by_key(|r| r.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisItem;
    use crate::storage::MemoryBackend;
    use serde_json::json;
    use tempfile::TempDir;

    fn memory_log() -> ReportLog {
        ReportLog::new(Box::new(MemoryBackend::default()))
    }

    fn sample_result(notes: &str) -> AnalysisResult {
        AnalysisResult {
            inventory: vec![AnalysisItem {
                name: "タコ（1袋）".to_string(),
                ideal: json!(2),
                current: json!(1),
            }],
            notes: Some(notes.to_string()),
        }
    }

    #[test]
    fn test_latest_empty_is_none() {
        let log = memory_log();
        assert!(log.latest().unwrap().is_none());
    }

    #[test]
    fn test_append_ids_are_monotonic_from_one() {
        let log = memory_log();
        for expected in 1..=5 {
            let id = log.append(&sample_result("r")).unwrap();
            assert_eq!(id, expected);
        }
        assert_eq!(log.latest().unwrap().unwrap().id, 5);
    }

    #[test]
    fn test_append_coerces_non_integers_to_null() {
        let log = memory_log();
        let result = AnalysisResult {
            inventory: vec![
                AnalysisItem {
                    name: "紅生姜".to_string(),
                    ideal: json!("a few"),
                    current: json!(2.5),
                },
                AnalysisItem {
                    name: "青のり".to_string(),
                    ideal: json!(null),
                    current: json!(3),
                },
            ],
            notes: None,
        };
        log.append(&result).unwrap();

        let report = log.latest().unwrap().unwrap();
        assert_eq!(report.inventory[0].ideal, None);
        assert_eq!(report.inventory[0].current, None);
        assert_eq!(report.inventory[1].ideal, None);
        assert_eq!(report.inventory[1].current, Some(3));
        assert_eq!(report.notes, None);
    }

    #[test]
    fn test_append_never_mutates_prior_entries() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("reports.json");
        let log = ReportLog::json_file(&path);

        log.append(&sample_result("first")).unwrap();
        let first = log.latest().unwrap().unwrap();
        log.append(&sample_result("second")).unwrap();

        let file: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let reports = file["reports"].as_array().unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0]["id"], 1);
        assert_eq!(reports[0]["notes"], "first");
        assert_eq!(
            serde_json::from_value::<Report>(reports[0].clone()).unwrap(),
            first
        );
        assert_eq!(reports[1]["id"], 2);
    }

    #[test]
    fn test_initialize_writes_empty_log_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("reports.json");
        let log = ReportLog::json_file(&path);
        log.initialize().unwrap();
        assert!(path.exists());

        log.append(&sample_result("r")).unwrap();
        log.initialize().unwrap();
        assert_eq!(log.latest().unwrap().unwrap().id, 1);
    }
}
