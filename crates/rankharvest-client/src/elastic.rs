use std::time::Duration;

use rankharvest_core::error::HarvestError;
use rankharvest_core::models::ResultRecord;
use rankharvest_core::traits::PersistenceSink;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Indexes result records into Elasticsearch over its REST API.
///
/// Each record becomes one document under `{index}/{doc_type}` with an
/// auto-generated id, so a retried write may store a duplicate.
#[derive(Clone)]
pub struct ElasticsearchSink {
    client: Client,
    base_url: String,
    index: String,
    doc_type: String,
    credentials: Option<(String, String)>,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct IndexResponse {
    result: String,
}

#[derive(Deserialize)]
struct ClusterInfo {
    #[serde(default)]
    cluster_name: String,
    #[serde(default)]
    version: Option<VersionInfo>,
}

#[derive(Deserialize)]
struct VersionInfo {
    number: String,
}

impl ElasticsearchSink {
    pub fn new(base_url: &str, index: &str, doc_type: &str) -> Result<Self, HarvestError> {
        Self::with_timeout(base_url, index, doc_type, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        index: &str,
        doc_type: &str,
        timeout: Duration,
    ) -> Result<Self, HarvestError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HarvestError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
            doc_type: doc_type.to_string(),
            credentials: None,
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    fn document_url(&self) -> String {
        format!("{}/{}/{}", self.base_url, self.index, self.doc_type)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> HarvestError {
        if e.is_timeout() {
            HarvestError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            HarvestError::Network(format!("Connection failed: {e}"))
        } else {
            HarvestError::Http(e.to_string())
        }
    }

    /// Check that the cluster answers. Used once at startup.
    pub async fn ping(&self) -> Result<(), HarvestError> {
        let response = self
            .authorize(self.client.get(&self.base_url))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HarvestError::Http(format!(
                "Elasticsearch ping failed (HTTP {}): {body}",
                status.as_u16()
            )));
        }

        let info: ClusterInfo = response
            .json()
            .await
            .map_err(|e| HarvestError::Http(format!("Unexpected ping response: {e}")))?;
        tracing::info!(
            cluster = %info.cluster_name,
            version = info.version.as_ref().map(|v| v.number.as_str()).unwrap_or("unknown"),
            "Logged into Elasticsearch"
        );
        Ok(())
    }
}

impl PersistenceSink for ElasticsearchSink {
    async fn write(&self, record: &ResultRecord) -> Result<(), HarvestError> {
        let response = self
            .authorize(self.client.post(self.document_url()))
            .json(record)
            .send()
            .await
            .map_err(|e| HarvestError::Write(self.transport_error(e).to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HarvestError::Write(format!(
                "HTTP {} indexing {} #{}: {body}",
                status.as_u16(),
                record.keyword,
                record.position
            )));
        }

        let indexed: IndexResponse = response
            .json()
            .await
            .map_err(|e| HarvestError::Write(format!("Unexpected index response: {e}")))?;
        tracing::debug!(keyword = %record.keyword, url = %record.url, result = %indexed.result, "Indexed");
        Ok(())
    }
}
