//! End-to-end scenarios for the intake pipeline against real HTTP endpoints.
//!
//! Small axum servers on ephemeral ports stand in for the GitHub contents API and the peer
//! instance so the reqwest-backed sinks are exercised over the wire.

mod common {
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{HeaderMap, Method, StatusCode, Uri};
    use axum::Router;
    use form_intake::config::{BackupConfig, PeerConfig};

    #[derive(Debug, Clone)]
    pub struct Captured {
        pub method: Method,
        pub path: String,
        pub headers: HeaderMap,
        pub body: Bytes,
    }

    #[derive(Clone)]
    pub struct Endpoint {
        pub addr: SocketAddr,
        captured: Arc<Mutex<Vec<Captured>>>,
    }

    impl Endpoint {
        pub fn url(&self) -> String {
            format!("http://{}", self.addr)
        }

        pub fn captured(&self) -> Vec<Captured> {
            self.captured.lock().expect("capture mutex").clone()
        }
    }

    #[derive(Clone)]
    struct EndpointState {
        captured: Arc<Mutex<Vec<Captured>>>,
        status: StatusCode,
        delay: Duration,
    }

    async fn capture(
        State(state): State<EndpointState>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> StatusCode {
        tokio::time::sleep(state.delay).await;
        state.captured.lock().expect("capture mutex").push(Captured {
            method,
            path: uri.path().to_string(),
            headers,
            body,
        });
        state.status
    }

    /// Spawn a catch-all endpoint answering every request with `status` after `delay`.
    pub async fn spawn_endpoint(status: StatusCode, delay: Duration) -> Endpoint {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().fallback(capture).with_state(EndpointState {
            captured: captured.clone(),
            status,
            delay,
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("endpoint serves");
        });
        Endpoint { addr, captured }
    }

    pub fn backup_config(api_base: String, timeout: Duration) -> BackupConfig {
        BackupConfig {
            api_base,
            repository: "acme/intake-data".to_string(),
            token: "gh-token".to_string(),
            branch: "main".to_string(),
            base_path: "backups".to_string(),
            timeout,
        }
    }

    pub fn peer_config(url: String, timeout: Duration) -> PeerConfig {
        PeerConfig {
            url,
            shared_key: Some("peer-secret".to_string()),
            timeout,
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use common::*;
use form_intake::intake::{
    FileRecordStore, GitHubBackupSink, IntakeService, LifecycleTracker, MarkOutcome,
    PeerForwardSink, Record, SubmissionKind,
};
use serde_json::{json, Value};

async fn store() -> (tempfile::TempDir, FileRecordStore) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let files = FileRecordStore::new(tmp.path());
    files.ensure_layout().await.expect("layout created");
    (tmp, files)
}

#[tokio::test]
async fn backup_and_peer_receive_authenticated_copies() {
    let (_tmp, files) = store().await;
    let github = spawn_endpoint(StatusCode::CREATED, Duration::ZERO).await;
    let peer = spawn_endpoint(StatusCode::OK, Duration::ZERO).await;

    let service = IntakeService::new(files.clone())
        .with_best_effort_sink(Arc::new(
            GitHubBackupSink::new(backup_config(github.url(), Duration::from_secs(2)))
                .expect("github client"),
        ))
        .with_best_effort_sink(Arc::new(
            PeerForwardSink::new(peer_config(
                format!("{}/api/registrations", peer.url()),
                Duration::from_secs(2),
            ))
            .expect("peer client"),
        ));

    let receipt = service
        .submit(
            SubmissionKind::Registration,
            json!({ "firstName": "Jane", "lastName": "Doe" }),
        )
        .await
        .expect("submission succeeds");
    let id = receipt.record.id.clone();
    let reports = receipt.deliveries.settle().await;
    assert!(reports.iter().all(|report| report.succeeded()), "{reports:?}");

    let backups = github.captured();
    assert_eq!(backups.len(), 1);
    let backup = &backups[0];
    assert_eq!(backup.method, Method::PUT);
    assert_eq!(
        backup.path,
        format!("/repos/acme/intake-data/contents/backups/pending-registrations/{id}.json")
    );
    assert_eq!(backup.headers["authorization"], "token gh-token");
    let body: Value = serde_json::from_slice(&backup.body).expect("json body");
    assert_eq!(body["branch"], "main");
    let decoded = BASE64
        .decode(body["content"].as_str().expect("content"))
        .expect("base64 content");
    let backed_up: Record = serde_json::from_slice(&decoded).expect("record content");
    assert_eq!(backed_up.id, id);

    let forwards = peer.captured();
    assert_eq!(forwards.len(), 1);
    assert_eq!(forwards[0].method, Method::POST);
    assert_eq!(forwards[0].path, "/api/registrations");
    assert_eq!(forwards[0].headers["x-api-key"], "peer-secret");
    let forwarded: Record = serde_json::from_slice(&forwards[0].body).expect("record body");
    assert_eq!(forwarded.id, id);
    assert_eq!(forwarded.payload["firstName"], "Jane");
}

#[tokio::test]
async fn rejected_slow_and_offline_sinks_still_succeed() {
    let (_tmp, files) = store().await;
    let github = spawn_endpoint(StatusCode::UNPROCESSABLE_ENTITY, Duration::ZERO).await;
    let slow_peer = spawn_endpoint(StatusCode::OK, Duration::from_secs(5)).await;

    let service = IntakeService::new(files.clone())
        .with_best_effort_sink(Arc::new(
            GitHubBackupSink::new(backup_config(github.url(), Duration::from_secs(2)))
                .expect("github client"),
        ))
        .with_best_effort_sink(Arc::new(
            PeerForwardSink::new(peer_config(slow_peer.url(), Duration::from_millis(100)))
                .expect("peer client"),
        ))
        .with_best_effort_sink(Arc::new(
            PeerForwardSink::new(peer_config(
                "http://127.0.0.1:1/offline".to_string(),
                Duration::from_millis(100),
            ))
            .expect("peer client"),
        ));

    let receipt = service
        .submit(SubmissionKind::Assignment, json!({ "shift": "night" }))
        .await
        .expect("load-bearing sinks succeeded");
    let path = files.pending_path(SubmissionKind::Assignment, receipt.record.id.as_str());
    assert!(path.is_file());

    let reports = receipt.deliveries.settle().await;
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|report| !report.succeeded()), "{reports:?}");
    assert!(reports[0]
        .error
        .as_deref()
        .expect("rejection reported")
        .contains("422"));
}

#[tokio::test]
async fn crm_poll_and_acknowledge_cycle() {
    let (_tmp, files) = store().await;
    let service = IntakeService::new(files.clone());
    let tracker = LifecycleTracker::new(files.clone());

    let mut ids = Vec::new();
    for name in ["first", "second", "third"] {
        let receipt = service
            .submit(SubmissionKind::Registration, json!({ "firstName": name }))
            .await
            .expect("submission succeeds");
        ids.push(receipt.record.id);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let pending = tracker
        .list_pending(SubmissionKind::Registration)
        .await
        .expect("pending listing");
    let listed: Vec<_> = pending.iter().map(|record| record.id.clone()).collect();
    let mut expected = ids.clone();
    expected.reverse();
    assert_eq!(listed, expected);

    let outcome = tracker
        .mark_processed(SubmissionKind::Registration, ids[1].as_str())
        .await
        .expect("acknowledged");
    assert!(matches!(outcome, MarkOutcome::Processed(_)));

    let pending = tracker
        .list_pending(SubmissionKind::Registration)
        .await
        .expect("pending listing");
    let processed = tracker
        .list_processed(SubmissionKind::Registration)
        .await
        .expect("processed listing");
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|record| record.id != ids[1]));
    assert_eq!(processed.len(), 1);
    assert_eq!(processed[0].id, ids[1]);
}
