//! Multi-sink intake pipeline for recruitment form submissions.
//!
//! A submission is normalized into a [`Record`], written to the load-bearing sinks
//! (primary relational store for candidate registrations, then the local file store) and
//! copied to the best-effort sinks in the background. Candidate registrations then wait in
//! the local store until the CRM acknowledges them through the [`LifecycleTracker`].

pub mod contact;
pub mod domain;
pub mod extract;
pub mod lifecycle;
pub mod normalizer;
pub mod router;
pub mod service;
pub mod sinks;
pub mod upload;

#[cfg(test)]
mod tests;

pub use contact::CandidateContact;
pub use domain::{Record, RecordId, SubmissionKind};
pub use extract::SubmissionBody;
pub use lifecycle::{LifecycleError, LifecycleTracker, MarkOutcome};
pub use normalizer::normalize;
pub use router::{failure_response, intake_router, IntakeState};
pub use service::{
    DeliveryReport, Deliveries, IdMinter, IntakeError, IntakeReceipt, IntakeService,
};
pub use sinks::{
    BestEffortSink, ContactStore, ContactStoreError, DeliveryError, FileRecordStore,
    GitHubBackupSink, PeerForwardSink, PostgresContactStore, StoreCounts, StoreError,
};
pub use upload::{UploadError, UploadStore};
