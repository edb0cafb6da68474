//! HTTP implementation of the agent protocol.
//!
//! Every call is a request against the agent's base URL with an `action`
//! query parameter. Anything but HTTP 200 is an error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    AddResult, Agent, AgentClient, AgentConnector, AgentDefaults, AgentError, AgentStatistics,
    DownloadEntry, FileStatus,
};

/// reqwest-backed agent client.
pub struct HttpAgentClient {
    client: Client,
    base_url: Url,
    request_timeout: Duration,
    download_timeout: Duration,
}

impl HttpAgentClient {
    pub fn new(base_url: &str, defaults: &AgentDefaults) -> Result<Self, AgentError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AgentError::Internal(format!("invalid agent URL {}: {}", base_url, e)))?;

        let client = Client::builder()
            .connect_timeout(defaults.request_timeout())
            .danger_accept_invalid_certs(defaults.accept_invalid_certs)
            .build()
            .map_err(|e| AgentError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            request_timeout: defaults.request_timeout(),
            download_timeout: defaults.download_timeout(),
        })
    }

    /// Base URL plus `action` and any extra query parameters. Query
    /// parameters already present on the base URL are kept.
    fn action_url(&self, action: &str, params: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("action", action);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, AgentError> {
        let response = request.send().await.map_err(map_request_error)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<T, AgentError> {
        let url = self.action_url(action, params);
        debug!("Agent request: GET {}", url);

        let response = self
            .send(self.client.get(url).timeout(self.request_timeout))
            .await?;

        response
            .json::<T>()
            .await
            .map_err(|e| AgentError::InvalidResponse(e.to_string()))
    }
}

fn map_request_error(e: reqwest::Error) -> AgentError {
    if e.is_timeout() {
        AgentError::Timeout
    } else {
        AgentError::ConnectionFailed(e.to_string())
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn statistics(&self) -> Result<AgentStatistics, AgentError> {
        self.get_json("statistics", &[]).await
    }

    async fn list(&self, label: &str) -> Result<Vec<DownloadEntry>, AgentError> {
        self.get_json("list", &[("label", label)]).await
    }

    async fn add(
        &self,
        metadata: Vec<u8>,
        file_name: &str,
        label: &str,
    ) -> Result<AddResult, AgentError> {
        let part = multipart::Part::bytes(metadata)
            .file_name(file_name.to_string())
            .mime_str("application/x-bittorrent")
            .map_err(|e| AgentError::Internal(e.to_string()))?;
        let form = multipart::Form::new()
            .part("meta", part)
            .text("label", label.to_string());

        let url = self.action_url("add", &[]);
        debug!("Agent request: POST {}", url);

        let response = self
            .send(
                self.client
                    .post(url)
                    .multipart(form)
                    .timeout(self.request_timeout),
            )
            .await?;

        response
            .json::<AddResult>()
            .await
            .map_err(|e| AgentError::InvalidResponse(e.to_string()))
    }

    async fn file_status(
        &self,
        hash: &str,
        indices: &[i64],
    ) -> Result<Vec<FileStatus>, AgentError> {
        let indices = indices
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.get_json("getFileStatus", &[("hash", hash), ("indices", &indices)])
            .await
    }

    async fn download_file(&self, hash: &str, index: i64) -> Result<Vec<u8>, AgentError> {
        let index = index.to_string();
        let url = self.action_url("downloadFile", &[("hash", hash), ("index", &index)]);
        debug!("Agent request: GET {}", url);

        let response = self
            .send(self.client.get(url).timeout(self.download_timeout))
            .await?;

        let bytes = response.bytes().await.map_err(map_request_error)?;
        Ok(bytes.to_vec())
    }
}

/// Builds [`HttpAgentClient`]s from agent records.
pub struct HttpAgentConnector {
    defaults: AgentDefaults,
}

impl HttpAgentConnector {
    pub fn new(defaults: AgentDefaults) -> Self {
        Self { defaults }
    }
}

impl AgentConnector for HttpAgentConnector {
    fn connect(&self, agent: &Agent) -> Result<Arc<dyn AgentClient>, AgentError> {
        Ok(Arc::new(HttpAgentClient::new(&agent.url, &self.defaults)?))
    }
}
