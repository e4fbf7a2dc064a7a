use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Serialize;
use tracing::debug;

use super::{BestEffortSink, DeliveryError};
use crate::config::BackupConfig;
use crate::intake::domain::Record;

const SINK: &str = "github backup";

#[derive(Debug, Serialize)]
struct ContentsRequest<'a> {
    message: String,
    content: String,
    branch: &'a str,
}

/// Commits each record as a JSON file through the GitHub contents API.
#[derive(Debug, Clone)]
pub struct GitHubBackupSink {
    client: reqwest::Client,
    config: BackupConfig,
}

impl GitHubBackupSink {
    pub fn new(config: BackupConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// `{api}/repos/{owner/repo}/contents/{base}/{kind dir}/{id}.json`
    pub fn contents_url(&self, record: &Record) -> String {
        let base_path = self.config.base_path.trim_matches('/');
        let prefix = if base_path.is_empty() {
            String::new()
        } else {
            format!("{base_path}/")
        };
        format!(
            "{}/repos/{}/contents/{}{}/{}.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.repository,
            prefix,
            record.kind.directory(),
            record.id
        )
    }

    fn commit_message(record: &Record) -> String {
        let first = record.text("firstName").unwrap_or_default();
        let last = record.text("lastName").unwrap_or_default();
        let name = format!("{first} {last}");
        let name = name.trim();
        if name.is_empty() {
            format!("Add {} {}", record.kind, record.id)
        } else {
            format!("Add {} {} ({name})", record.kind, record.id)
        }
    }
}

#[async_trait]
impl BestEffortSink for GitHubBackupSink {
    fn name(&self) -> &'static str {
        SINK
    }

    async fn deliver(&self, record: &Record) -> Result<(), DeliveryError> {
        let encoded = serde_json::to_vec_pretty(record)
            .map_err(|source| DeliveryError::Encode { sink: SINK, source })?;
        let body = ContentsRequest {
            message: Self::commit_message(record),
            content: BASE64.encode(encoded),
            branch: &self.config.branch,
        };

        let url = self.contents_url(record);
        let response = self
            .client
            .put(&url)
            .header(AUTHORIZATION, format!("token {}", self.config.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, "form-intake")
            .json(&body)
            .send()
            .await
            .map_err(|err| DeliveryError::unavailable(SINK, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::unavailable(SINK, format!("HTTP {status}")));
        }

        debug!(record_id = %record.id, %url, "backup committed");
        Ok(())
    }
}
