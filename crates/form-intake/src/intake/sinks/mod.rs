//! Persistence backends the orchestrator fans a record out to.
//!
//! Two seams exist: [`ContactStore`] for the load-bearing relational copy and
//! [`BestEffortSink`] for remote copies whose failure must never reach the caller.
//! The local [`FileRecordStore`] is concrete because it is also the lifecycle system of
//! record.

pub mod file_store;
pub mod github;
pub mod peer;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;

use super::contact::CandidateContact;
use super::domain::Record;

pub use file_store::{FileRecordStore, StoreError};
pub use github::GitHubBackupSink;
pub use peer::PeerForwardSink;
pub use postgres::PostgresContactStore;

/// Row counts exposed by `/api/stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub contacts: i64,
    pub jobs: i64,
    pub tasks: i64,
}

/// Primary relational store holding the CRM's canonical contact rows.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn insert_contact(
        &self,
        contact: &CandidateContact,
    ) -> Result<CandidateContact, ContactStoreError>;

    async fn counts(&self) -> Result<StoreCounts, ContactStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ContactStoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Remote copy that is attempted once and only ever logged on failure.
#[async_trait]
pub trait BestEffortSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, record: &Record) -> Result<(), DeliveryError>;
}

/// Transport errors, non-2xx answers and timeouts all collapse into `Unavailable`.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("{sink} unavailable: {reason}")]
    Unavailable { sink: &'static str, reason: String },
    #[error("{sink} could not encode record: {source}")]
    Encode {
        sink: &'static str,
        source: serde_json::Error,
    },
}

impl DeliveryError {
    pub(crate) fn unavailable(sink: &'static str, reason: impl ToString) -> Self {
        Self::Unavailable {
            sink,
            reason: reason.to_string(),
        }
    }
}
