use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::contact::CandidateContact;
use super::domain::{Record, RecordId, SubmissionKind};
use super::normalizer::{mint_id, normalize};
use super::sinks::{
    BestEffortSink, ContactStore, ContactStoreError, DeliveryError, FileRecordStore, StoreCounts,
    StoreError,
};

const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ID_ATTEMPTS: usize = 5;

/// Produces `{prefix}_...` ids; [`mint_id`] unless replaced.
pub type IdMinter = Arc<dyn Fn(&str, DateTime<Utc>) -> String + Send + Sync>;

/// Drives one submission across the sink set.
///
/// Order: primary relational store (registrations only), then the local file store, both
/// load-bearing; then every best-effort sink as a detached task the caller never waits on.
pub struct IntakeService {
    files: FileRecordStore,
    contacts: Option<Arc<dyn ContactStore>>,
    best_effort: Vec<Arc<dyn BestEffortSink>>,
    delivery_timeout: Duration,
    mint: IdMinter,
}

impl IntakeService {
    pub fn new(files: FileRecordStore) -> Self {
        Self {
            files,
            contacts: None,
            best_effort: Vec::new(),
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            mint: Arc::new(mint_id),
        }
    }

    pub fn with_contact_store(mut self, store: Arc<dyn ContactStore>) -> Self {
        self.contacts = Some(store);
        self
    }

    pub fn with_best_effort_sink(mut self, sink: Arc<dyn BestEffortSink>) -> Self {
        self.best_effort.push(sink);
        self
    }

    /// Upper bound on each detached delivery, on top of the sink's own client timeout.
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    pub fn with_id_minter(mut self, mint: IdMinter) -> Self {
        self.mint = mint;
        self
    }

    pub fn files(&self) -> &FileRecordStore {
        &self.files
    }

    pub fn has_contact_store(&self) -> bool {
        self.contacts.is_some()
    }

    /// Normalize, persist and fan out a submission.
    pub async fn submit(
        &self,
        kind: SubmissionKind,
        body: Value,
    ) -> Result<IntakeReceipt, IntakeError> {
        let mut record = normalize(kind, body);
        self.reserve_id(&mut record).await?;
        info!(record_id = %record.id, %kind, "submission received");

        let contact = match (&self.contacts, kind) {
            (Some(store), SubmissionKind::Registration) => {
                let contact = CandidateContact::from_record(&record, Utc::now());
                let stored = store.insert_contact(&contact).await.map_err(|err| {
                    error!(record_id = %record.id, error = %err, "primary store write failed");
                    IntakeError::Primary(err)
                })?;
                Some(stored)
            }
            _ => None,
        };

        self.files.put(&record).await.map_err(|err| {
            error!(record_id = %record.id, error = %err, "local store write failed");
            IntakeError::Local(err)
        })?;

        let deliveries = self.dispatch(&record);
        Ok(IntakeReceipt {
            record,
            contact,
            deliveries,
        })
    }

    pub async fn counts(&self) -> Result<StoreCounts, IntakeError> {
        let store = self
            .contacts
            .as_ref()
            .ok_or(IntakeError::PrimaryNotConfigured)?;
        store.counts().await.map_err(IntakeError::Primary)
    }

    // A minted id is only probabilistically unique; never hand out one already on disk.
    async fn reserve_id(&self, record: &mut Record) -> Result<(), IntakeError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = (self.mint)(record.kind.id_prefix(), record.timestamp);
            let taken = self
                .files
                .contains(record.kind, &candidate)
                .await
                .map_err(IntakeError::Local)?;
            if !taken {
                record.id = RecordId(candidate);
                return Ok(());
            }
            warn!(record_id = %candidate, "generated id already stored; reminting");
        }
        Err(IntakeError::IdExhausted)
    }

    fn dispatch(&self, record: &Record) -> Deliveries {
        let handles = self
            .best_effort
            .iter()
            .map(|sink| {
                let sink = Arc::clone(sink);
                let record = record.clone();
                let limit = self.delivery_timeout;
                tokio::spawn(async move {
                    let name = sink.name();
                    let result = match tokio::time::timeout(limit, sink.deliver(&record)).await {
                        Ok(result) => result,
                        Err(_) => Err(DeliveryError::unavailable(
                            name,
                            format!("timed out after {}ms", limit.as_millis()),
                        )),
                    };

                    match &result {
                        Ok(()) => info!(record_id = %record.id, sink = name, "best-effort copy stored"),
                        Err(err) => warn!(record_id = %record.id, sink = name, error = %err, "best-effort copy skipped"),
                    }

                    DeliveryReport {
                        sink: name,
                        error: result.err().map(|err| err.to_string()),
                    }
                })
            })
            .collect();

        Deliveries { handles }
    }
}

/// Outcome of a successful submission.
#[derive(Debug)]
pub struct IntakeReceipt {
    pub record: Record,
    pub contact: Option<CandidateContact>,
    pub deliveries: Deliveries,
}

/// Handles to the detached best-effort writes. Dropping this detaches them for good.
#[derive(Debug)]
pub struct Deliveries {
    handles: Vec<JoinHandle<DeliveryReport>>,
}

impl Deliveries {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every detached write to finish.
    pub async fn settle(self) -> Vec<DeliveryReport> {
        let mut reports = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(err) => reports.push(DeliveryReport {
                    sink: "unknown",
                    error: Some(format!("delivery task failed: {err}")),
                }),
            }
        }
        reports
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sink: &'static str,
    pub error: Option<String>,
}

impl DeliveryReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("primary store write failed: {0}")]
    Primary(#[source] ContactStoreError),
    #[error("local store write failed: {0}")]
    Local(#[source] StoreError),
    #[error("primary store is not configured")]
    PrimaryNotConfigured,
    #[error("could not mint an unused record id")]
    IdExhausted,
}
