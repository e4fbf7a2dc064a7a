use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Form families accepted by the intake endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionKind {
    Registration,
    Assignment,
    ClientRegistration,
    HolidayRequest,
}

impl SubmissionKind {
    pub const ALL: [SubmissionKind; 4] = [
        SubmissionKind::Registration,
        SubmissionKind::Assignment,
        SubmissionKind::ClientRegistration,
        SubmissionKind::HolidayRequest,
    ];

    pub fn id_prefix(self) -> &'static str {
        match self {
            SubmissionKind::Registration => "REG",
            SubmissionKind::Assignment => "ASSIGN",
            SubmissionKind::ClientRegistration => "CLIENT",
            SubmissionKind::HolidayRequest => "HOLIDAY",
        }
    }

    /// Directory (relative to the store root) holding this kind's files.
    pub fn directory(self) -> &'static str {
        match self {
            SubmissionKind::Registration => "pending-registrations",
            SubmissionKind::Assignment => "assignments",
            SubmissionKind::ClientRegistration => "client-registrations",
            SubmissionKind::HolidayRequest => "holiday-requests",
        }
    }

    pub fn source_tag(self) -> &'static str {
        match self {
            SubmissionKind::Registration => "candidate_registration",
            SubmissionKind::Assignment => "assignment_confirmation",
            SubmissionKind::ClientRegistration => "client_registration",
            SubmissionKind::HolidayRequest => "holiday_request",
        }
    }

    /// Only candidate registrations wait for CRM acknowledgment; the rest are write-once.
    pub fn tracks_lifecycle(self) -> bool {
        matches!(self, SubmissionKind::Registration)
    }

    pub fn label(self) -> &'static str {
        match self {
            SubmissionKind::Registration => "registration",
            SubmissionKind::Assignment => "assignment",
            SubmissionKind::ClientRegistration => "client-registration",
            SubmissionKind::HolidayRequest => "holiday-request",
        }
    }
}

impl fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Ids double as file names, so anything that could escape a directory is rejected.
    pub fn is_safe_file_stem(raw: &str) -> bool {
        !raw.is_empty()
            && raw.len() <= 128
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical unit flowing through the sinks.
///
/// Caller-supplied fields live under `payload`; the generated fields sit beside it and
/// can never be shadowed by a body that happens to reuse their names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    pub kind: SubmissionKind,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    pub payload: Map<String, Value>,
}

impl Record {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Scalar payload value rendered as text; absent, null and nested values yield `None`.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.payload.get(key)? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            Value::Bool(value) => Some(value.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn mark_processed(&mut self, at: DateTime<Utc>) {
        self.processed = true;
        self.processed_at = Some(at);
    }
}
