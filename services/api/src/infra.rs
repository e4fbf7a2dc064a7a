use form_intake::config::AppConfig;
use form_intake::error::AppError;
use form_intake::intake::{
    FileRecordStore, GitHubBackupSink, IntakeService, IntakeState, PeerForwardSink,
    PostgresContactStore, UploadStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

// Headroom over the HTTP client timeout so the client reports its own expiry first.
const DELIVERY_GRACE: Duration = Duration::from_secs(1);

/// Wire every configured sink into the intake service. Absent sinks are logged, not fatal.
pub(crate) async fn build_intake_state(config: &AppConfig) -> Result<IntakeState, AppError> {
    let files = FileRecordStore::new(&config.storage.data_dir);
    files.ensure_layout().await?;
    info!(data_dir = %config.storage.data_dir.display(), "local record store ready");

    let mut service = IntakeService::new(files);
    let mut delivery_timeout = Duration::ZERO;

    match &config.database {
        Some(database) => {
            let store = PostgresContactStore::connect_lazy(database)?;
            store.probe().await;
            service = service.with_contact_store(Arc::new(store));
        }
        None => info!("primary relational store not configured; local store is the system of record"),
    }

    match &config.backup {
        Some(backup) => {
            delivery_timeout = delivery_timeout.max(backup.timeout);
            service = service.with_best_effort_sink(Arc::new(GitHubBackupSink::new(backup.clone())?));
            info!(repository = %backup.repository, "remote backup enabled");
        }
        None => info!("remote backup not configured"),
    }

    match &config.peer {
        Some(peer) => {
            delivery_timeout = delivery_timeout.max(peer.timeout);
            service = service.with_best_effort_sink(Arc::new(PeerForwardSink::new(peer.clone())?));
            info!(peer = %peer.url, "peer forward enabled");
        }
        None => info!("peer forward not configured"),
    }

    if delivery_timeout > Duration::ZERO {
        service = service.with_delivery_timeout(delivery_timeout + DELIVERY_GRACE);
    }

    let uploads = UploadStore::new(&config.upload.dir, config.upload.max_bytes);
    Ok(IntakeState::new(service, uploads).with_body_limit(config.server.body_limit))
}
