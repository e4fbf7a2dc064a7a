use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::contact::CandidateContact;
use super::domain::{Record, SubmissionKind};
use super::extract::SubmissionBody;
use super::lifecycle::{LifecycleError, LifecycleTracker, MarkOutcome};
use super::service::{IntakeReceipt, IntakeService};
use super::upload::{UploadError, UploadStore};
use crate::config::DEFAULT_BODY_LIMIT;

/// Shared handles behind every intake route.
#[derive(Clone)]
pub struct IntakeState {
    pub service: Arc<IntakeService>,
    pub lifecycle: Arc<LifecycleTracker>,
    pub uploads: Arc<UploadStore>,
    pub body_limit: usize,
}

impl IntakeState {
    pub fn new(service: IntakeService, uploads: UploadStore) -> Self {
        let lifecycle = LifecycleTracker::new(service.files().clone());
        Self {
            service: Arc::new(service),
            lifecycle: Arc::new(lifecycle),
            uploads: Arc::new(uploads),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Cap on JSON submission bodies. Uploads carry their own cap.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }
}

/// Router builder exposing the submission, acknowledgment and passthrough endpoints.
pub fn intake_router(state: IntakeState) -> Router {
    let upload_limit = state.uploads.max_bytes();
    let body_limit = DefaultBodyLimit::max(state.body_limit);

    Router::new()
        .route(
            "/api/registrations",
            post(submit_registration).layer(body_limit),
        )
        .route("/api/registrations/pending", get(pending_registrations))
        .route("/api/registrations/processed", get(processed_registrations))
        .route("/api/registrations/:id/process", post(process_registration))
        .route(
            "/api/assignments/confirm",
            post(confirm_assignment).layer(body_limit),
        )
        .route(
            "/api/client-registrations",
            post(submit_client_registration).layer(body_limit),
        )
        .route(
            "/api/holiday-requests",
            post(submit_holiday_request).layer(body_limit),
        )
        .route("/api/stats", get(stats))
        .route(
            "/api/upload",
            post(upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
}

/// Uniform `{success:false, error, details?}` envelope.
pub fn failure_response(status: StatusCode, error: &str, details: Option<String>) -> Response {
    let mut body = json!({
        "success": false,
        "error": error,
    });
    if let Some(details) = details {
        body["details"] = Value::String(details);
    }
    (status, Json(body)).into_response()
}

fn success_body(kind: SubmissionKind, record: &Record, contact: Option<&CandidateContact>) -> Value {
    match kind {
        SubmissionKind::Registration => {
            let mut body = json!({
                "success": true,
                "message": "Registration received and saved",
                "registrationId": record.id,
            });
            if let Some(contact) = contact {
                body["candidateId"] = Value::String(contact.id.clone());
            }
            body
        }
        SubmissionKind::Assignment => json!({
            "success": true,
            "message": "Assignment confirmation received",
            "assignmentId": record.id,
        }),
        SubmissionKind::ClientRegistration => json!({
            "success": true,
            "message": "Client registration received",
            "clientId": record.id,
        }),
        SubmissionKind::HolidayRequest => json!({
            "success": true,
            "message": "Holiday request received",
            "requestId": record.id,
        }),
    }
}

fn failure_message(kind: SubmissionKind) -> &'static str {
    match kind {
        SubmissionKind::Registration => "Registration processing failed",
        SubmissionKind::Assignment => "Assignment confirmation failed",
        SubmissionKind::ClientRegistration => "Client registration failed",
        SubmissionKind::HolidayRequest => "Holiday request failed",
    }
}

pub(crate) async fn submit(state: &IntakeState, kind: SubmissionKind, body: Value) -> Response {
    match state.service.submit(kind, body).await {
        Ok(IntakeReceipt {
            record, contact, ..
        }) => (
            StatusCode::OK,
            Json(success_body(kind, &record, contact.as_ref())),
        )
            .into_response(),
        Err(err) => failure_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            failure_message(kind),
            Some(err.to_string()),
        ),
    }
}

pub(crate) async fn submit_registration(
    State(state): State<IntakeState>,
    SubmissionBody(body): SubmissionBody,
) -> Response {
    submit(&state, SubmissionKind::Registration, body).await
}

pub(crate) async fn confirm_assignment(
    State(state): State<IntakeState>,
    SubmissionBody(body): SubmissionBody,
) -> Response {
    submit(&state, SubmissionKind::Assignment, body).await
}

pub(crate) async fn submit_client_registration(
    State(state): State<IntakeState>,
    SubmissionBody(body): SubmissionBody,
) -> Response {
    submit(&state, SubmissionKind::ClientRegistration, body).await
}

pub(crate) async fn submit_holiday_request(
    State(state): State<IntakeState>,
    SubmissionBody(body): SubmissionBody,
) -> Response {
    submit(&state, SubmissionKind::HolidayRequest, body).await
}

pub(crate) async fn pending_registrations(State(state): State<IntakeState>) -> Response {
    match state
        .lifecycle
        .list_pending(SubmissionKind::Registration)
        .await
    {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(err) => {
            error!(error = %err, "pending listing failed");
            failure_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to list pending registrations",
                Some(err.to_string()),
            )
        }
    }
}

pub(crate) async fn processed_registrations(State(state): State<IntakeState>) -> Response {
    match state
        .lifecycle
        .list_processed(SubmissionKind::Registration)
        .await
    {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(err) => failure_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to list processed registrations",
            Some(err.to_string()),
        ),
    }
}

pub(crate) async fn process_registration(
    State(state): State<IntakeState>,
    Path(id): Path<String>,
) -> Response {
    match state
        .lifecycle
        .mark_processed(SubmissionKind::Registration, &id)
        .await
    {
        Ok(MarkOutcome::Processed(_)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!("Registration {id} marked as processed"),
            })),
        )
            .into_response(),
        Ok(MarkOutcome::AlreadyProcessed) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!("Registration {id} was already processed"),
            })),
        )
            .into_response(),
        Err(err @ LifecycleError::InvalidId(_)) => failure_response(
            StatusCode::BAD_REQUEST,
            "Invalid registration id",
            Some(err.to_string()),
        ),
        Err(err) => {
            error!(record_id = %id, error = %err, "mark processed failed");
            failure_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to mark registration as processed",
                Some(err.to_string()),
            )
        }
    }
}

pub(crate) async fn stats(State(state): State<IntakeState>) -> Response {
    match state.service.counts().await {
        Ok(counts) => (
            StatusCode::OK,
            Json(json!({
                "contacts": counts.contacts,
                "jobs": counts.jobs,
                "tasks": counts.tasks,
                "status": "connected",
            })),
        )
            .into_response(),
        Err(err) => failure_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(err.to_string()),
        ),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UploadParams {
    #[serde(default)]
    filename: Option<String>,
}

pub(crate) async fn upload(
    State(state): State<IntakeState>,
    Query(params): Query<UploadParams>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            return failure_response(
                rejection.status(),
                "Upload rejected",
                Some(rejection.body_text()),
            )
        }
    };
    match state.uploads.store(params.filename.as_deref(), &body).await {
        Ok(filename) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Upload stored",
                "filename": filename,
                "bytes": body.len(),
            })),
        )
            .into_response(),
        Err(err @ UploadError::InvalidName(_)) => failure_response(
            StatusCode::BAD_REQUEST,
            "Invalid upload name",
            Some(err.to_string()),
        ),
        Err(err @ UploadError::Exists(_)) => failure_response(
            StatusCode::CONFLICT,
            "Upload name already taken",
            Some(err.to_string()),
        ),
        Err(err) => {
            error!(error = %err, "upload failed");
            failure_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Upload failed",
                Some(err.to_string()),
            )
        }
    }
}
