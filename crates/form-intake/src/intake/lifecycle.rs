use std::cmp::Reverse;

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{Record, RecordId, SubmissionKind};
use super::sinks::{FileRecordStore, StoreError};

/// Result of a successful acknowledgment.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkOutcome {
    /// The record moved from pending to processed on this call.
    Processed(Record),
    /// An earlier (or concurrent) call already moved it.
    AlreadyProcessed,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("unknown id {0}")]
    UnknownId(String),
    #[error("invalid record id '{0}'")]
    InvalidId(String),
    #[error("{0} submissions are write-once and cannot be processed")]
    NotTracked(SubmissionKind),
    #[error("processed copy of {0} failed verification")]
    Verification(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Pending -> processed state machine over the local file store.
///
/// A record lives in `{kind dir}/{id}.json` while pending and in
/// `{kind dir}/processed/{id}.json` afterwards. The move is write-new, fsync, verify,
/// delete-old. If the delete fails the record sits in both places until the next
/// acknowledgment of the same id cleans it up.
#[derive(Debug, Clone)]
pub struct LifecycleTracker {
    files: FileRecordStore,
}

impl LifecycleTracker {
    pub fn new(files: FileRecordStore) -> Self {
        Self { files }
    }

    /// Pending records, newest first. Corrupt files are skipped.
    pub async fn list_pending(&self, kind: SubmissionKind) -> Result<Vec<Record>, LifecycleError> {
        let records = self.files.scan(&self.files.kind_dir(kind)).await?;
        Ok(newest_first(records))
    }

    /// Acknowledged records, newest first.
    pub async fn list_processed(
        &self,
        kind: SubmissionKind,
    ) -> Result<Vec<Record>, LifecycleError> {
        if !kind.tracks_lifecycle() {
            return Err(LifecycleError::NotTracked(kind));
        }
        let records = self.files.scan(&self.files.processed_dir(kind)).await?;
        Ok(newest_first(records))
    }

    /// Move one record to processed. Safe to repeat and to race on the same id.
    pub async fn mark_processed(
        &self,
        kind: SubmissionKind,
        id: &str,
    ) -> Result<MarkOutcome, LifecycleError> {
        if !kind.tracks_lifecycle() {
            return Err(LifecycleError::NotTracked(kind));
        }
        if !RecordId::is_safe_file_stem(id) {
            return Err(LifecycleError::InvalidId(id.to_string()));
        }

        let pending_path = self.files.pending_path(kind, id);
        let processed_path = self.files.processed_path(kind, id);

        let Some(mut record) = self.files.read_optional(&pending_path).await? else {
            return if self.files.exists(&processed_path).await? {
                info!(record_id = id, "record already processed");
                Ok(MarkOutcome::AlreadyProcessed)
            } else {
                Err(LifecycleError::UnknownId(id.to_string()))
            };
        };

        if self.files.exists(&processed_path).await? {
            // Left over from a move whose delete step never ran.
            warn!(record_id = id, "pending copy of processed record found; removing");
            self.files.remove(&pending_path).await?;
            return Ok(MarkOutcome::AlreadyProcessed);
        }

        record.mark_processed(Utc::now());
        self.files.write_record(&processed_path, &record).await?;

        let stored = self.files.read(&processed_path).await?;
        if stored.id != record.id || !stored.processed {
            return Err(LifecycleError::Verification(id.to_string()));
        }

        if !self.files.remove(&pending_path).await? {
            info!(record_id = id, "pending copy already removed by a concurrent call");
        }

        info!(record_id = id, %kind, "record marked processed");
        Ok(MarkOutcome::Processed(record))
    }
}

fn newest_first(mut records: Vec<Record>) -> Vec<Record> {
    records.sort_by_key(|record| Reverse((record.timestamp, record.id.0.clone())));
    records
}
