//! Discovery sources.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use super::types::{Candidate, IntakeError, SourceRecord};

/// Collaborator announcing new items. Feed formats are its business: it
/// hands over candidates and fetches URLs on request.
#[async_trait]
pub trait Source: Send + Sync {
    /// Items currently announced.
    async fn poll(&self) -> Result<Vec<Candidate>, IntakeError>;

    /// Raw bytes behind a candidate's metadata or image URL.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, IntakeError>;
}

/// Creates sources for persisted source records.
pub trait SourceConnector: Send + Sync {
    fn connect(&self, record: &SourceRecord) -> Result<Arc<dyn Source>, IntakeError>;
}

/// Source backed by an HTTP endpoint that lists candidates as a JSON array
/// of `{"title", "metadataUrl", "imageUrl"}` objects.
pub struct HttpSource {
    client: Client,
    url: Url,
}

impl HttpSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, IntakeError> {
        let url = Url::parse(url)
            .map_err(|e| IntakeError::Fetch(format!("invalid source URL {}: {}", url, e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IntakeError::Fetch(e.to_string()))?;
        Ok(Self { client, url })
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, IntakeError> {
        debug!("Source request: GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IntakeError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(IntakeError::Fetch(format!(
                "HTTP {} from {}",
                response.status(),
                response.url()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl Source for HttpSource {
    async fn poll(&self) -> Result<Vec<Candidate>, IntakeError> {
        self.get(self.url.clone())
            .await?
            .json()
            .await
            .map_err(|e| IntakeError::Fetch(format!("invalid candidate list: {}", e)))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, IntakeError> {
        // Relative URLs resolve against the source's own URL.
        let url = self
            .url
            .join(url)
            .map_err(|e| IntakeError::Fetch(format!("invalid URL {}: {}", url, e)))?;
        let bytes = self
            .get(url)
            .await?
            .bytes()
            .await
            .map_err(|e| IntakeError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Builds [`HttpSource`]s from source records.
pub struct HttpSourceConnector {
    timeout: Duration,
}

impl HttpSourceConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl SourceConnector for HttpSourceConnector {
    fn connect(&self, record: &SourceRecord) -> Result<Arc<dyn Source>, IntakeError> {
        Ok(Arc::new(HttpSource::new(&record.url, self.timeout)?))
    }
}
