use async_trait::async_trait;
use tracing::debug;

use super::{BestEffortSink, DeliveryError};
use crate::config::PeerConfig;
use crate::intake::domain::Record;

const SINK: &str = "peer forward";

/// Header carrying the opaque key shared with the peer instance.
pub const SHARED_KEY_HEADER: &str = "x-api-key";

/// Posts the raw record to another intake instance, which may well be offline.
#[derive(Debug, Clone)]
pub struct PeerForwardSink {
    client: reqwest::Client,
    config: PeerConfig,
}

impl PeerForwardSink {
    pub fn new(config: PeerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl BestEffortSink for PeerForwardSink {
    fn name(&self) -> &'static str {
        SINK
    }

    async fn deliver(&self, record: &Record) -> Result<(), DeliveryError> {
        let mut request = self.client.post(&self.config.url).json(record);
        if let Some(key) = &self.config.shared_key {
            request = request.header(SHARED_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| DeliveryError::unavailable(SINK, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::unavailable(SINK, format!("HTTP {status}")));
        }

        debug!(record_id = %record.id, peer = %self.config.url, "record forwarded to peer");
        Ok(())
    }
}
