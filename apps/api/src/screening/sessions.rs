//! In-memory registry of screening batches for the lifetime of the process.
//!
//! Each batch keeps its cancellation token and the records produced so far, so
//! clients can poll partial results while the batch runs. Finished batches are
//! evicted once they are older than the retention window; running batches are
//! never evicted.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::screening::models::{ScreeningOutcome, ScreeningRecord};
use crate::screening::results::{BatchStats, ResultsAccumulator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct BatchSnapshot {
    pub batch_id: Uuid,
    pub state: BatchState,
    pub total: usize,
    pub completed: usize,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub records: Vec<ScreeningRecord>,
    pub stats: BatchStats,
}

struct BatchProgress {
    state: BatchState,
    results: ResultsAccumulator,
    error: Option<String>,
    finished_at: Option<DateTime<Utc>>,
}

pub struct BatchEntry {
    pub id: Uuid,
    pub total: usize,
    pub created_at: DateTime<Utc>,
    cancel: CancellationToken,
    progress: RwLock<BatchProgress>,
}

impl BatchEntry {
    fn new(total: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            total,
            created_at: Utc::now(),
            cancel: CancellationToken::new(),
            progress: RwLock::new(BatchProgress {
                state: BatchState::Running,
                results: ResultsAccumulator::new(),
                error: None,
                finished_at: None,
            }),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops dispatching new work. Records already produced are kept.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> BatchState {
        self.read().state
    }

    /// Appends a record as it completes, for partial-result polling.
    pub fn record_completed(&self, record: &ScreeningRecord) {
        self.write().results.push(record.clone());
    }

    /// Replaces partial results with the final, upload-ordered set.
    /// The batch counts as cancelled only if cancellation actually skipped a file.
    pub fn finish(&self, results: ResultsAccumulator) {
        let skipped = results
            .records()
            .iter()
            .any(|r| matches!(r.outcome, ScreeningOutcome::Skipped { .. }));
        let mut progress = self.write();
        progress.results = results;
        progress.state = if skipped {
            BatchState::Cancelled
        } else {
            BatchState::Completed
        };
        progress.finished_at = Some(Utc::now());
    }

    pub fn fail(&self, error: String) {
        let mut progress = self.write();
        progress.state = BatchState::Failed;
        progress.error = Some(error);
        progress.finished_at = Some(Utc::now());
    }

    /// Finished at least `retention` before `now`. Running batches never expire.
    fn is_expired(&self, now: DateTime<Utc>, retention: chrono::Duration) -> bool {
        self.read()
            .finished_at
            .is_some_and(|finished| now - finished >= retention)
    }

    /// Records produced so far, in upload order.
    pub fn records(&self) -> Vec<ScreeningRecord> {
        let mut results = self.read().results.clone();
        results.sort_by_upload_order();
        results.records().to_vec()
    }

    pub fn ranked(&self) -> Vec<ScreeningRecord> {
        self.read().results.ranked()
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        let progress = self.read();
        let mut results = progress.results.clone();
        results.sort_by_upload_order();

        BatchSnapshot {
            batch_id: self.id,
            state: progress.state,
            total: self.total,
            completed: results.len(),
            cancel_requested: self.cancel.is_cancelled(),
            created_at: self.created_at,
            finished_at: progress.finished_at,
            error: progress.error.clone(),
            stats: results.stats(),
            records: results.records().to_vec(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BatchProgress> {
        self.progress
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BatchProgress> {
        self.progress
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct BatchRegistry {
    batches: RwLock<HashMap<Uuid, Arc<BatchEntry>>>,
    retention: chrono::Duration,
}

impl BatchRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            batches: RwLock::new(HashMap::new()),
            retention: chrono::Duration::from_std(retention)
                .unwrap_or_else(|_| chrono::Duration::days(365)),
        }
    }

    pub fn create(&self, total: usize) -> Arc<BatchEntry> {
        self.evict_expired();
        let entry = Arc::new(BatchEntry::new(total));
        self.batches
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(entry.id, entry.clone());
        entry
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<BatchEntry>> {
        self.evict_expired();
        self.batches
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
            .cloned()
    }

    fn evict_expired(&self) {
        let now = Utc::now();
        let mut batches = self
            .batches
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = batches.len();
        batches.retain(|_, entry| !entry.is_expired(now, self.retention));
        let evicted = before - batches.len();
        if evicted > 0 {
            debug!("Evicted {evicted} finished screening batches");
        }
    }
}
