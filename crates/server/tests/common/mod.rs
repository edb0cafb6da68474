//! Common test utilities for API testing with mocks.
//!
//! The fixture builds the real router around an orchestrator whose agents,
//! sources and destination are mocks, so tests can drive releases through
//! their lifecycle without any external service.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use atus_core::{
    intake::{AcceptAll, NoLookup},
    orchestrator::OrchestratorConfig,
    release::{classify, NewRelease},
    samples::SamplesConfig,
    testing::{
        MockConnector, MockDestination, MockSampleProcessor, MockSourceConnector,
    },
    upload::UploadConfig,
    ArtifactStore, Config, DatabaseConfig, EventBus, Orchestrator, OrchestratorParts,
    SqliteStore, StorageConfig,
};

/// Re-export fixtures for test convenience
pub use atus_core::testing::fixtures;

const HOUR_MS: u64 = 3_600_000;

/// Test fixture for API testing with mock dependencies.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// The orchestrator behind the router, for stepping it by hand
    pub orchestrator: Arc<Orchestrator>,
    /// Mock agent connector - one mock client per agent id
    pub connector: Arc<MockConnector>,
    /// Mock destination - records uploads
    pub destination: Arc<MockDestination>,
    /// Temporary directory for test database and artifacts
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with uploads configured.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let data_dir = temp_dir.path().join("data");

        let mut config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            storage: StorageConfig {
                data_dir: data_dir.clone(),
            },
            orchestrator: OrchestratorConfig {
                // Tests step the orchestrator by hand
                tick_interval_ms: HOUR_MS,
                meta_files_interval_ms: HOUR_MS,
                ..Default::default()
            },
            ..Default::default()
        };
        if !test_config.disable_uploads {
            config.upload = UploadConfig {
                api_url: "http://destination.invalid/api.php".to_string(),
                auth_token: "secret-token".to_string(),
                tracker_announce_url: "http://tracker.invalid/announce".to_string(),
                ..Default::default()
            };
        }

        let connector = Arc::new(MockConnector::new());
        let destination = Arc::new(MockDestination::new());

        let store = Arc::new(SqliteStore::new(&db_path).expect("Failed to create store"));
        let orchestrator = Arc::new(Orchestrator::new(
            config.orchestrator_settings(),
            OrchestratorParts {
                store,
                artifacts: ArtifactStore::new(&data_dir),
                agents: connector.clone(),
                sources: Arc::new(MockSourceConnector::new()),
                lookup: Arc::new(NoLookup),
                policy: Arc::new(AcceptAll),
                destination: destination.clone(),
                sample_processor: Arc::new(MockSampleProcessor::new()),
                events: EventBus::new(),
            },
        ));
        orchestrator
            .start()
            .await
            .expect("Failed to start orchestrator");

        let state = Arc::new(atus_server::state::AppState::new(
            config,
            Arc::clone(&orchestrator),
        ));
        let router = atus_server::api::create_router(state);

        Self {
            router,
            orchestrator,
            connector,
            destination,
            temp_dir,
        }
    }

    /// Submit a release through intake and wait until it is tracked.
    pub async fn add_release(&self, name: &str) -> NewRelease {
        let bytes = fixtures::structure_bytes(
            name,
            &[(&format!("{}.nfo", name), 100), (&format!("{}.mkv", name), 50_000)],
        );
        let release = classify(name, None, bytes, None, &SamplesConfig::default())
            .expect("Failed to classify release");

        self.orchestrator
            .submit(release.clone())
            .await
            .expect("Failed to submit release");

        let working_set = self.orchestrator.working_set();
        let start = std::time::Instant::now();
        while !working_set.contains(&release.release.hash).await {
            assert!(
                start.elapsed() < Duration::from_secs(5),
                "release {} never tracked",
                name
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        release
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a PATCH request with JSON body.
    pub async fn patch(&self, path: &str, body: Value) -> TestResponse {
        self.request("PATCH", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Leave `[upload]` empty so releases stop at DOWNLOADED
    pub disable_uploads: bool,
}

impl TestConfig {
    pub fn without_uploads() -> Self {
        Self {
            disable_uploads: true,
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
