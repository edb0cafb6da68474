//! The destination tracker's upload endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{multipart, Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::codec::FileEntry;
use crate::release::{Category, MetaFile};

use super::config::UploadConfig;
use super::UploadError;

/// Everything the destination receives for one release.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Re-encoded structure carrying the destination's announce URL.
    pub structure: Vec<u8>,
    pub nfo: Vec<u8>,
    /// Sorted by path.
    pub files: Vec<FileEntry>,
    pub meta_files: Vec<MetaFile>,
    pub hash: String,
    pub name: String,
    pub category: Category,
    pub category_raw: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Accepts finished releases.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Submit a release. Anything but an explicit success is an error.
    async fn upload(&self, submission: Submission) -> Result<(), UploadError>;
}

/// Destination used while uploads are not configured. Refuses everything.
pub struct NoDestination;

#[async_trait]
impl Destination for NoDestination {
    async fn upload(&self, _submission: Submission) -> Result<(), UploadError> {
        Err(UploadError::NotConfigured)
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
}

/// Multipart POST to `<api_url>?action=upload&authentication=<token>`.
pub struct HttpDestination {
    client: Client,
    url: Url,
    user_id: String,
}

impl HttpDestination {
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        let mut url = Url::parse(&config.api_url).map_err(|e| {
            UploadError::Request(format!("invalid upload URL {}: {}", config.api_url, e))
        })?;
        url.query_pairs_mut()
            .append_pair("action", "upload")
            .append_pair("authentication", &config.auth_token);

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| UploadError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url,
            user_id: config.user_id.clone(),
        })
    }

    fn form(&self, submission: Submission) -> Result<multipart::Form, UploadError> {
        let file_list = serde_json::to_string(&submission.files)
            .map_err(|e| UploadError::Request(e.to_string()))?;
        let meta_files = serde_json::to_string(&submission.meta_files)
            .map_err(|e| UploadError::Request(e.to_string()))?;
        let pre = submission
            .published_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_default();

        let torrent = multipart::Part::bytes(submission.structure)
            .file_name("torrent.torrent")
            .mime_str("application/x-bittorrent")
            .map_err(|e| UploadError::Request(e.to_string()))?;
        let nfo = multipart::Part::bytes(submission.nfo).file_name("nfo.nfo");

        Ok(multipart::Form::new()
            .part("torrent", torrent)
            .part("nfo", nfo)
            .text("fileList", file_list)
            .text("metaFiles", meta_files)
            .text("hash", submission.hash)
            .text("name", submission.name)
            .text("category", submission.category.as_str().to_string())
            .text("categoryRaw", submission.category_raw)
            .text("pre", pre)
            .text("userID", self.user_id.clone()))
    }
}

#[async_trait]
impl Destination for HttpDestination {
    async fn upload(&self, submission: Submission) -> Result<(), UploadError> {
        let form = self.form(submission)?;
        debug!("Destination request: POST {}", self.url.path());

        let response = self
            .client
            .post(self.url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UploadError::Request("request timeout".to_string())
                } else {
                    UploadError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Request(e.to_string()))?;

        let parsed: UploadResponse = serde_json::from_str(&body).map_err(|e| {
            UploadError::InvalidResponse(format!(
                "HTTP {}: {} ({})",
                status,
                e,
                body.chars().take(200).collect::<String>()
            ))
        })?;

        if !parsed.success {
            return Err(UploadError::Rejected(parsed.message));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn submission() -> Submission {
        Submission {
            structure: b"d4:infode".to_vec(),
            nfo: b"nfo text".to_vec(),
            files: vec![FileEntry {
                path: vec!["a.mkv".to_string()],
                length: 10,
            }],
            meta_files: Vec::new(),
            hash: "abc".to_string(),
            name: "Some.Release-GRP".to_string(),
            category: Category::Movie,
            category_raw: "X264".to_string(),
            published_at: None,
        }
    }

    fn config(server: &MockServer) -> UploadConfig {
        UploadConfig {
            api_url: server.url("/api.php"),
            auth_token: "secret".to_string(),
            user_id: "42".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upload_success() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api.php")
                .query_param("action", "upload")
                .query_param("authentication", "secret")
                .body_includes("name=\"torrent\"; filename=\"torrent.torrent\"")
                .body_includes("name=\"nfo\"; filename=\"nfo.nfo\"")
                .body_includes("Some.Release-GRP")
                .body_includes("MOVIE");
            then.status(200)
                .json_body(json!({"success": true, "message": ""}));
        });

        let destination = HttpDestination::new(&config(&server)).unwrap();
        destination.upload(submission()).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_upload_rejected() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api.php");
            then.status(200)
                .json_body(json!({"success": false, "message": "dupe"}));
        });

        let destination = HttpDestination::new(&config(&server)).unwrap();
        match destination.upload(submission()).await {
            Err(UploadError::Rejected(message)) => assert_eq!(message, "dupe"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_garbage_response() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api.php");
            then.status(500).body("internal error");
        });

        let destination = HttpDestination::new(&config(&server)).unwrap();
        assert!(matches!(
            destination.upload(submission()).await,
            Err(UploadError::InvalidResponse(_))
        ));
    }
}
