use std::io;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::intake::contact::CandidateContact;
use crate::intake::domain::Record;
use crate::intake::router::IntakeState;
use crate::intake::service::IntakeService;
use crate::intake::sinks::{
    BestEffortSink, ContactStore, ContactStoreError, DeliveryError, FileRecordStore, StoreCounts,
};
use crate::intake::upload::UploadStore;

#[derive(Default)]
pub(super) struct MemoryContacts {
    rows: Mutex<Vec<CandidateContact>>,
}

impl MemoryContacts {
    pub(super) fn rows(&self) -> Vec<CandidateContact> {
        self.rows.lock().expect("contacts mutex poisoned").clone()
    }
}

#[async_trait]
impl ContactStore for MemoryContacts {
    async fn insert_contact(
        &self,
        contact: &CandidateContact,
    ) -> Result<CandidateContact, ContactStoreError> {
        self.rows
            .lock()
            .expect("contacts mutex poisoned")
            .push(contact.clone());
        Ok(contact.clone())
    }

    async fn counts(&self) -> Result<StoreCounts, ContactStoreError> {
        let contacts = self.rows.lock().expect("contacts mutex poisoned").len() as i64;
        Ok(StoreCounts {
            contacts,
            jobs: 2,
            tasks: 5,
        })
    }
}

pub(super) struct UnavailableContacts;

fn connection_refused() -> ContactStoreError {
    ContactStoreError::Database(sqlx::Error::Io(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        "connection refused",
    )))
}

#[async_trait]
impl ContactStore for UnavailableContacts {
    async fn insert_contact(
        &self,
        _contact: &CandidateContact,
    ) -> Result<CandidateContact, ContactStoreError> {
        Err(connection_refused())
    }

    async fn counts(&self) -> Result<StoreCounts, ContactStoreError> {
        Err(connection_refused())
    }
}

#[derive(Default)]
pub(super) struct RecordingSink {
    delivered: Mutex<Vec<Record>>,
}

impl RecordingSink {
    pub(super) fn delivered(&self) -> Vec<Record> {
        self.delivered.lock().expect("sink mutex poisoned").clone()
    }
}

#[async_trait]
impl BestEffortSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn deliver(&self, record: &Record) -> Result<(), DeliveryError> {
        self.delivered
            .lock()
            .expect("sink mutex poisoned")
            .push(record.clone());
        Ok(())
    }
}

pub(super) struct FailingSink;

#[async_trait]
impl BestEffortSink for FailingSink {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn deliver(&self, _record: &Record) -> Result<(), DeliveryError> {
        Err(DeliveryError::unavailable("failing", "HTTP 502 Bad Gateway"))
    }
}

pub(super) struct StalledSink;

#[async_trait]
impl BestEffortSink for StalledSink {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn deliver(&self, _record: &Record) -> Result<(), DeliveryError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

pub(super) async fn file_store() -> (tempfile::TempDir, FileRecordStore) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = FileRecordStore::new(tmp.path().join("data"));
    store.ensure_layout().await.expect("layout created");
    (tmp, store)
}

pub(super) fn state_for(service: IntakeService, tmp: &tempfile::TempDir) -> IntakeState {
    IntakeState::new(service, UploadStore::new(tmp.path().join("uploads"), 64))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&body).expect("json body")
}
