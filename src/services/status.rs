//! Status reporting
//!
//! Workers and the watcher report every stage change through a
//! [`StatusSink`]. [`StatusTable`] is the in-process store: one record per
//! original filename, upserted on every update.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Mutex;

/// Processing stage of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Queued,
    Extracting,
    Classifying,
    Naming,
    Placing,
    Succeeded,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Succeeded | Stage::Failed)
    }
}

/// One status event for a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub original_filename: String,
    pub new_filename: Option<String>,
    pub stage: Stage,
    pub message: String,
}

impl StatusUpdate {
    pub fn new(original_filename: impl Into<String>, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            original_filename: original_filename.into(),
            new_filename: None,
            stage,
            message: message.into(),
        }
    }

    pub fn with_new_filename(mut self, new_filename: impl Into<String>) -> Self {
        self.new_filename = Some(new_filename.into());
        self
    }
}

/// Receives status events; implementations must tolerate concurrent calls
pub trait StatusSink: Send + Sync {
    fn report(&self, update: StatusUpdate);
}

/// Latest known state of a document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub original_filename: String,
    pub new_filename: Option<String>,
    pub stage: Stage,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

/// Concurrent table of status records keyed by original filename
#[derive(Debug, Default)]
pub struct StatusTable {
    records: DashMap<String, StatusRecord>,
}

impl StatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, original_filename: &str) -> Option<StatusRecord> {
        self.records.get(original_filename).map(|r| r.value().clone())
    }

    /// All records, most recently updated first
    pub fn snapshot(&self) -> Vec<StatusRecord> {
        let mut records: Vec<StatusRecord> = self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records currently in `stage`
    pub fn count_in(&self, stage: Stage) -> usize {
        self.records.iter().filter(|r| r.stage == stage).count()
    }
}

impl StatusSink for StatusTable {
    fn report(&self, update: StatusUpdate) {
        let now = Utc::now();
        self.records
            .entry(update.original_filename.clone())
            .and_modify(|record| {
                if update.new_filename.is_some() {
                    record.new_filename = update.new_filename.clone();
                }
                record.stage = update.stage;
                record.message = update.message.clone();
                record.updated_at = now;
            })
            .or_insert_with(|| StatusRecord {
                original_filename: update.original_filename.clone(),
                new_filename: update.new_filename.clone(),
                stage: update.stage,
                message: update.message.clone(),
                updated_at: now,
            });
    }
}

/// Append-only history of every update, in arrival order
#[derive(Debug, Default)]
pub struct StatusLog {
    updates: Mutex<Vec<StatusUpdate>>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Updates for one document, in order
    pub fn for_file(&self, original_filename: &str) -> Vec<StatusUpdate> {
        self.updates()
            .into_iter()
            .filter(|u| u.original_filename == original_filename)
            .collect()
    }

    /// Stage sequence for one document
    pub fn stages(&self, original_filename: &str) -> Vec<Stage> {
        self.for_file(original_filename).iter().map(|u| u.stage).collect()
    }
}

impl StatusSink for StatusLog {
    fn report(&self, update: StatusUpdate) {
        self.updates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_table_upserts_by_original_filename() {
        let table = StatusTable::new();
        table.report(StatusUpdate::new("scan.pdf", Stage::Queued, "Queued for processing"));
        table.report(StatusUpdate::new("scan.pdf", Stage::Extracting, "Processing..."));

        assert_eq!(table.len(), 1);
        let record = table.get("scan.pdf").unwrap();
        assert_eq!(record.stage, Stage::Extracting);
        assert_eq!(record.message, "Processing...");
    }

    #[test]
    fn test_update_without_new_filename_keeps_previous() {
        let table = StatusTable::new();
        table.report(
            StatusUpdate::new("scan.pdf", Stage::Naming, "Naming failed (UNKNOWN_DOC)")
                .with_new_filename("UNKNOWN_DOC"),
        );
        table.report(StatusUpdate::new("scan.pdf", Stage::Placing, "Moving file"));

        let record = table.get("scan.pdf").unwrap();
        assert_eq!(record.new_filename.as_deref(), Some("UNKNOWN_DOC"));
        assert_eq!(record.stage, Stage::Placing);

        table.report(
            StatusUpdate::new("scan.pdf", Stage::Succeeded, "Success").with_new_filename("UNKNOWN_DOC.pdf"),
        );
        assert_eq!(
            table.get("scan.pdf").unwrap().new_filename.as_deref(),
            Some("UNKNOWN_DOC.pdf")
        );
    }

    #[test]
    fn test_snapshot_is_newest_first() {
        let table = StatusTable::new();
        table.report(StatusUpdate::new("a.pdf", Stage::Queued, "q"));
        std::thread::sleep(std::time::Duration::from_millis(5));
        table.report(StatusUpdate::new("b.pdf", Stage::Queued, "q"));
        std::thread::sleep(std::time::Duration::from_millis(5));
        table.report(StatusUpdate::new("a.pdf", Stage::Succeeded, "Success"));

        let names: Vec<String> = table
            .snapshot()
            .into_iter()
            .map(|r| r.original_filename)
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
        assert_eq!(table.count_in(Stage::Succeeded), 1);
    }

    #[test]
    fn test_concurrent_reports() {
        let table = Arc::new(StatusTable::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    for stage in [Stage::Queued, Stage::Extracting, Stage::Succeeded] {
                        table.report(StatusUpdate::new(format!("doc{}.pdf", i), stage, "x"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(table.len(), 8);
        assert_eq!(table.count_in(Stage::Succeeded), 8);
    }

    #[test]
    fn test_log_keeps_order() {
        let log = StatusLog::new();
        log.report(StatusUpdate::new("x.pdf", Stage::Queued, "q"));
        log.report(StatusUpdate::new("y.pdf", Stage::Queued, "q"));
        log.report(StatusUpdate::new("x.pdf", Stage::Failed, "Error"));

        assert_eq!(log.stages("x.pdf"), vec![Stage::Queued, Stage::Failed]);
        assert_eq!(log.updates().len(), 3);
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        assert_eq!(serde_json::to_value(Stage::Succeeded).unwrap(), "succeeded");
        assert!(Stage::Failed.is_terminal());
        assert!(!Stage::Placing.is_terminal());
    }
}
