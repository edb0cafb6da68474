//! Orchestrator lifecycle integration tests.
//!
//! These tests drive releases through the orchestrator with mock agents and a
//! mock destination:
//! NEW -> DOWNLOAD_INIT -> DOWNLOADING -> DOWNLOADED -> UPLOADED
//!
//! Schedulers run with long intervals; the tests step the orchestrator with
//! `tick()` and `poll_agent()` so every transition is deterministic.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use atus_core::{
    agent::{Agent, AgentSeed, AllocationPolicy, DownloadState},
    intake::{AcceptAll, NoLookup},
    orchestrator::{OrchestratorConfig, OrchestratorError, WorkingSet},
    release::{classify, MetaFileKind, MetaFileState, NewRelease},
    samples::SamplesConfig,
    testing::{
        fixtures, MockAgentClient, MockConnector, MockDestination, MockSampleProcessor,
        MockSourceConnector, RecordingSubscriber,
    },
    upload::{UploadConfig, UploadError},
    ArtifactStore, EventBus, LifecycleEvent, Orchestrator, OrchestratorParts,
    OrchestratorSettings, ReleaseState, SqliteStore, Store,
};

const HOUR_MS: u64 = 3_600_000;

/// Test helper to create all dependencies for orchestrator testing.
struct TestHarness {
    store: Arc<SqliteStore>,
    connector: Arc<MockConnector>,
    sources: Arc<MockSourceConnector>,
    destination: Arc<MockDestination>,
    events: EventBus,
    recorder: Arc<RecordingSubscriber>,
    data_dir: PathBuf,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let store = Arc::new(SqliteStore::new(&db_path).expect("Failed to create store"));

        let events = EventBus::new();
        let recorder = Arc::new(RecordingSubscriber::new());
        events.subscribe(recorder.clone());

        Self {
            store,
            connector: Arc::new(MockConnector::new()),
            sources: Arc::new(MockSourceConnector::new()),
            destination: Arc::new(MockDestination::new()),
            events,
            recorder,
            data_dir: temp_dir.path().join("data"),
            _temp_dir: temp_dir,
        }
    }

    fn settings(&self, uploads: bool) -> OrchestratorSettings {
        let upload = if uploads {
            UploadConfig {
                api_url: "http://destination.invalid/api.php".to_string(),
                tracker_announce_url: "http://tracker.invalid/announce".to_string(),
                user_announce_url: "http://tracker.invalid/announce?passkey=u".to_string(),
                ..Default::default()
            }
        } else {
            UploadConfig::default()
        };

        OrchestratorSettings {
            orchestrator: OrchestratorConfig {
                // Long intervals: the tests step everything by hand.
                tick_interval_ms: HOUR_MS,
                meta_files_interval_ms: HOUR_MS,
                stalled_after_secs: 0,
                ..Default::default()
            },
            upload,
            ..Default::default()
        }
    }

    fn create_orchestrator(&self, settings: OrchestratorSettings) -> Orchestrator {
        Orchestrator::new(
            settings,
            OrchestratorParts {
                store: Arc::clone(&self.store) as Arc<dyn Store>,
                artifacts: ArtifactStore::new(&self.data_dir),
                agents: self.connector.clone(),
                sources: self.sources.clone(),
                lookup: Arc::new(NoLookup),
                policy: Arc::new(AcceptAll),
                destination: self.destination.clone(),
                sample_processor: Arc::new(MockSampleProcessor::new()),
                events: self.events.clone(),
            },
        )
    }

    async fn add_agent(&self, orchestrator: &Orchestrator, name: &str) -> (Agent, Arc<MockAgentClient>) {
        let agent = orchestrator
            .add_agent(AgentSeed {
                name: name.to_string(),
                url: format!("http://{}.invalid/", name),
                enabled: true,
                statistics_interval_secs: Some(3600),
                list_interval_secs: Some(3600),
                min_free_disk_space: Some(0),
            })
            .await
            .expect("Failed to add agent");
        let client = self.connector.client(&agent.id);
        orchestrator
            .poll_agent(&agent.id)
            .await
            .expect("Failed to poll agent");
        (agent, client)
    }

    fn new_release(name: &str) -> NewRelease {
        let bytes = fixtures::structure_bytes(
            name,
            &[(&format!("{}.nfo", name), 100), (&format!("{}.mkv", name), 50_000)],
        );
        classify(name, None, bytes, None, &SamplesConfig::default())
            .expect("Failed to classify release")
    }

    /// Submit a release and wait until intake tracks it.
    async fn intake(&self, orchestrator: &Orchestrator, release: NewRelease) -> (String, String) {
        let id = release.release.id.clone();
        let hash = release.release.hash.clone();
        orchestrator.submit(release).await.expect("Failed to submit");
        assert!(
            wait_until_tracked(&orchestrator.working_set(), &hash, Duration::from_secs(5)).await,
            "release {} never reached the working set",
            hash
        );
        (id, hash)
    }

    fn state(&self, release_id: &str) -> Option<ReleaseState> {
        self.store
            .get_release(release_id)
            .ok()
            .flatten()
            .map(|r| r.state)
    }

    async fn wait_for_state(
        &self,
        release_id: &str,
        expected: ReleaseState,
        timeout: Duration,
    ) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            if self.state(release_id) == Some(expected) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

async fn wait_until_tracked(working_set: &WorkingSet, hash: &str, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if working_set.contains(hash).await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

fn nfo_index(release: &NewRelease) -> i64 {
    release
        .release
        .meta_file(MetaFileKind::Nfo)
        .expect("release has an nfo")
        .index
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_release_goes_from_new_to_uploaded() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator(harness.settings(true));
    orchestrator.start().await.unwrap();

    let (agent, client) = harness.add_agent(&orchestrator, "fs-1").await;
    let new = TestHarness::new_release("Some.Movie.2024-GRP");
    let nfo = nfo_index(&new);
    let (id, hash) = harness.intake(&orchestrator, new).await;
    assert_eq!(harness.state(&id), Some(ReleaseState::New));

    // Allocation and submission.
    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::DownloadInit));
    let stored = harness.store.get_release(&id).unwrap().unwrap();
    assert_eq!(stored.agent_id.as_deref(), Some(agent.id.as_str()));
    let added = client.added().await;
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].label, "ATUS Download");

    // The agent starts downloading.
    client.set_download(&hash, DownloadState::Started, 40.0).await;
    orchestrator.poll_agent(&agent.id).await.unwrap();
    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::Downloading));

    // The nfo finishes, then everything.
    client.set_file(&hash, nfo, b"nfo text".to_vec()).await;
    client.set_download(&hash, DownloadState::Started, 100.0).await;
    orchestrator.poll_agent(&agent.id).await.unwrap();
    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::Downloaded));

    // Upload happens once every meta file has settled.
    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::Uploaded));

    let stored = harness.store.get_release(&id).unwrap().unwrap();
    assert!(stored.uploaded_at.is_some());
    assert!(!orchestrator.working_set().contains(&hash).await);

    let submissions = harness.destination.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].nfo, b"nfo text");

    let added = client.added().await;
    assert_eq!(added.len(), 2);
    assert_eq!(added[1].label, "ATUS Upload");

    let record = harness.store.get_agent(&agent.id).unwrap().unwrap();
    assert_eq!(record.files_submitted, 1);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_state_changes_are_monotonic_and_announced() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator(harness.settings(true));
    orchestrator.start().await.unwrap();

    let (agent, client) = harness.add_agent(&orchestrator, "fs-1").await;
    let new = TestHarness::new_release("Monotonic-GRP");
    let nfo = nfo_index(&new);
    let (id, hash) = harness.intake(&orchestrator, new).await;

    client.set_download(&hash, DownloadState::Started, 100.0).await;
    client.set_file(&hash, nfo, b"nfo".to_vec()).await;
    for _ in 0..6 {
        orchestrator.poll_agent(&agent.id).await.unwrap();
        orchestrator.tick().await;
    }
    assert_eq!(harness.state(&id), Some(ReleaseState::Uploaded));

    let changes: Vec<(ReleaseState, ReleaseState)> = harness
        .recorder
        .of_type("release_state_changed")
        .into_iter()
        .filter_map(|e| match e {
            LifecycleEvent::ReleaseStateChanged {
                release_id,
                from,
                to,
                ..
            } if release_id == id => Some((from, to)),
            _ => None,
        })
        .collect();

    assert_eq!(
        changes,
        vec![
            (ReleaseState::New, ReleaseState::DownloadInit),
            (ReleaseState::DownloadInit, ReleaseState::Downloading),
            (ReleaseState::Downloading, ReleaseState::Downloaded),
            (ReleaseState::Downloaded, ReleaseState::Uploaded),
        ]
    );
    for (from, to) in changes {
        assert!(from.can_transition_to(to));
    }

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_without_eligible_agent_release_stays_new() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator(harness.settings(true));
    orchestrator.start().await.unwrap();

    let (id, _) = harness
        .intake(&orchestrator, TestHarness::new_release("Waiting-GRP"))
        .await;

    orchestrator.tick().await;
    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::New));

    // An agent too full for the release is not eligible either.
    let (agent, client) = harness.add_agent(&orchestrator, "fs-1").await;
    client.set_free_space(10).await;
    orchestrator.poll_agent(&agent.id).await.unwrap();
    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::New));

    client.set_free_space(1 << 40).await;
    orchestrator.poll_agent(&agent.id).await.unwrap();
    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::DownloadInit));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_failed_submission_is_retried_next_tick() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator(harness.settings(true));
    orchestrator.start().await.unwrap();

    let (_, client) = harness.add_agent(&orchestrator, "fs-1").await;
    let (id, _) = harness
        .intake(&orchestrator, TestHarness::new_release("Retry-GRP"))
        .await;

    client
        .set_next_error(atus_core::AgentError::ConnectionFailed("refused".into()))
        .await;
    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::New));

    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::DownloadInit));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_hash_mismatch_is_general_error() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator(harness.settings(true));
    orchestrator.start().await.unwrap();

    let (_, client) = harness.add_agent(&orchestrator, "fs-1").await;
    client
        .set_add_hash("0000000000000000000000000000000000000000")
        .await;
    let (id, hash) = harness
        .intake(&orchestrator, TestHarness::new_release("Mismatch-GRP"))
        .await;

    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::GeneralError));
    assert!(!orchestrator.working_set().contains(&hash).await);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_release_without_processed_structure_is_general_error() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator(harness.settings(true));
    orchestrator.start().await.unwrap();

    let (_, client) = harness.add_agent(&orchestrator, "fs-1").await;
    let mut new = TestHarness::new_release("No.Structure-GRP");
    for meta_file in new.release.meta_files.iter_mut() {
        if meta_file.kind == MetaFileKind::Torrent {
            meta_file.state = MetaFileState::Unknown;
        }
    }
    let (id, hash) = harness.intake(&orchestrator, new).await;

    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::GeneralError));
    assert!(!orchestrator.working_set().contains(&hash).await);
    assert!(client.added().await.is_empty());

    // Terminal: later ticks leave it alone.
    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::GeneralError));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_missing_structure_file_is_general_error() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator(harness.settings(true));
    orchestrator.start().await.unwrap();

    let (_, client) = harness.add_agent(&orchestrator, "fs-1").await;
    let new = TestHarness::new_release("Lost.Structure-GRP");
    let structure_file = new
        .release
        .meta_file(MetaFileKind::Torrent)
        .expect("release has a structure")
        .file_name
        .clone();
    let (id, hash) = harness.intake(&orchestrator, new).await;

    let path = harness.data_dir.join(&id).join(&structure_file);
    assert!(path.exists());
    std::fs::remove_file(&path).unwrap();

    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::GeneralError));
    assert!(!orchestrator.working_set().contains(&hash).await);
    assert!(client.added().await.is_empty());

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_downloaded_release_waits_for_unsettled_meta_files() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator(harness.settings(true));
    orchestrator.start().await.unwrap();

    let (agent, client) = harness.add_agent(&orchestrator, "fs-1").await;
    let new = TestHarness::new_release("Slow.Nfo-GRP");
    let nfo = nfo_index(&new);
    let (id, hash) = harness.intake(&orchestrator, new).await;

    // Complete download, but the nfo is never reported finished.
    client.set_download(&hash, DownloadState::Started, 100.0).await;
    for _ in 0..5 {
        orchestrator.poll_agent(&agent.id).await.unwrap();
        orchestrator.tick().await;
    }
    assert_eq!(harness.state(&id), Some(ReleaseState::Downloaded));
    assert!(orchestrator.working_set().contains(&hash).await);
    assert_eq!(harness.destination.attempts(), 0);

    let stored = harness.store.get_release(&id).unwrap().unwrap();
    assert_eq!(
        stored.meta_file(MetaFileKind::Nfo).unwrap().state,
        MetaFileState::Unknown
    );

    // A manual upload is refused too, without leaving the automatic path.
    assert!(matches!(
        orchestrator.retry_upload(&id).await,
        Err(OrchestratorError::InvalidState { .. })
    ));
    assert_eq!(harness.state(&id), Some(ReleaseState::Downloaded));
    assert_eq!(harness.destination.attempts(), 0);

    // Once the nfo arrives the release uploads.
    client.set_file(&hash, nfo, b"late nfo".to_vec()).await;
    orchestrator.poll_agent(&agent.id).await.unwrap();
    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::Uploaded));
    assert_eq!(harness.destination.submissions()[0].nfo, b"late nfo");

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_downloaded_release_waits_without_upload_config() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator(harness.settings(false));
    orchestrator.start().await.unwrap();

    let (agent, client) = harness.add_agent(&orchestrator, "fs-1").await;
    let new = TestHarness::new_release("Unconfigured-GRP");
    let nfo = nfo_index(&new);
    let (id, hash) = harness.intake(&orchestrator, new).await;

    client.set_download(&hash, DownloadState::Started, 100.0).await;
    client.set_file(&hash, nfo, b"nfo".to_vec()).await;
    for _ in 0..5 {
        orchestrator.poll_agent(&agent.id).await.unwrap();
        orchestrator.tick().await;
    }

    assert_eq!(harness.state(&id), Some(ReleaseState::Downloaded));
    assert!(orchestrator.working_set().contains(&hash).await);
    assert_eq!(harness.destination.attempts(), 0);

    let err = orchestrator.retry_upload(&id).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Upload(UploadError::NotConfigured)
    ));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_upload_error_then_manual_retry() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator(harness.settings(true));
    orchestrator.start().await.unwrap();

    let (agent, client) = harness.add_agent(&orchestrator, "fs-1").await;
    let new = TestHarness::new_release("Rejected-GRP");
    let nfo = nfo_index(&new);
    let (id, hash) = harness.intake(&orchestrator, new).await;

    // Not retryable before the download finished.
    assert!(matches!(
        orchestrator.retry_upload(&id).await,
        Err(OrchestratorError::InvalidState { .. })
    ));

    harness.destination.set_reject_all(Some("duplicate"));
    client.set_download(&hash, DownloadState::Started, 100.0).await;
    client.set_file(&hash, nfo, b"nfo".to_vec()).await;
    for _ in 0..5 {
        orchestrator.poll_agent(&agent.id).await.unwrap();
        orchestrator.tick().await;
    }
    assert_eq!(harness.state(&id), Some(ReleaseState::UploadError));
    assert!(!orchestrator.working_set().contains(&hash).await);

    harness.destination.set_reject_all(None);
    let release = orchestrator.retry_upload(&id).await.unwrap();
    assert_eq!(release.state, ReleaseState::Uploaded);
    assert_eq!(harness.state(&id), Some(ReleaseState::Uploaded));
    assert_eq!(harness.destination.submissions().len(), 1);

    // Terminal success is not retried again.
    assert!(orchestrator.retry_upload(&id).await.is_err());

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_stalled_release_keeps_state_until_agent_returns() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator(harness.settings(true));
    orchestrator.start().await.unwrap();

    let (agent, client) = harness.add_agent(&orchestrator, "fs-1").await;
    let (id, hash) = harness
        .intake(&orchestrator, TestHarness::new_release("Stalled-GRP"))
        .await;

    client.set_download(&hash, DownloadState::Started, 20.0).await;
    orchestrator.tick().await;
    orchestrator.poll_agent(&agent.id).await.unwrap();
    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::Downloading));

    orchestrator.disable_agent(&agent.id).await.unwrap();
    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::Downloading));
    assert_eq!(orchestrator.status().await.stalled, 1);

    orchestrator.enable_agent(&agent.id).await.unwrap();
    client.set_download(&hash, DownloadState::Started, 100.0).await;
    orchestrator.poll_agent(&agent.id).await.unwrap();
    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::Downloaded));
    assert_eq!(orchestrator.status().await.stalled, 0);

    orchestrator.shutdown().await;
}

// =============================================================================
// Management Tests
// =============================================================================

#[tokio::test]
async fn test_delete_release_cleans_up_everything() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator(harness.settings(true));
    orchestrator.start().await.unwrap();

    let (id, hash) = harness
        .intake(&orchestrator, TestHarness::new_release("Deleted-GRP"))
        .await;
    let release_dir = harness.data_dir.join(&id);
    assert!(release_dir.exists());

    let deleted = orchestrator.delete_release(&id).await.unwrap();
    assert_eq!(deleted.hash, hash);
    assert!(harness.store.get_release(&id).unwrap().is_none());
    assert!(!orchestrator.working_set().contains(&hash).await);
    assert!(!release_dir.exists());
    assert_eq!(harness.recorder.of_type("release_deleted").len(), 1);

    assert!(matches!(
        orchestrator.delete_release(&id).await,
        Err(OrchestratorError::ReleaseNotFound(_))
    ));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_release_deleted_during_meta_file_fetch_leaves_nothing_behind() {
    let harness = TestHarness::new();
    let orchestrator = Arc::new(harness.create_orchestrator(harness.settings(true)));
    orchestrator.start().await.unwrap();

    let (agent, client) = harness.add_agent(&orchestrator, "fs-1").await;
    let new = TestHarness::new_release("Deleted.Mid.Fetch-GRP");
    let nfo = nfo_index(&new);
    let (id, hash) = harness.intake(&orchestrator, new).await;
    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::DownloadInit));

    client.set_file(&hash, nfo, b"nfo".to_vec()).await;
    let gate = client.hold_downloads().await;
    let poll = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        let agent_id = agent.id.clone();
        async move { orchestrator.poll_agent(&agent_id).await }
    });

    gate.entered.notified().await;
    orchestrator.delete_release(&id).await.unwrap();
    gate.proceed.notify_one();
    poll.await.unwrap().unwrap();

    assert!(harness.store.get_release(&id).unwrap().is_none());
    assert!(!harness.data_dir.join(&id).exists());
    assert!(!orchestrator.working_set().contains(&hash).await);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_agent_in_use_cannot_be_deleted() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator(harness.settings(true));
    orchestrator.start().await.unwrap();

    let (agent, _) = harness.add_agent(&orchestrator, "fs-1").await;
    let (id, _) = harness
        .intake(&orchestrator, TestHarness::new_release("InUse-GRP"))
        .await;
    orchestrator.tick().await;
    assert_eq!(harness.state(&id), Some(ReleaseState::DownloadInit));

    assert!(matches!(
        orchestrator.delete_agent(&agent.id).await,
        Err(OrchestratorError::AgentInUse(_))
    ));

    orchestrator.delete_release(&id).await.unwrap();
    orchestrator.delete_agent(&agent.id).await.unwrap();
    assert!(orchestrator.agents().await.is_empty());
    assert!(harness.store.get_agent(&agent.id).unwrap().is_none());

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_bootstrap_agents_skips_known_names() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator(harness.settings(true));

    let seeds = vec![
        AgentSeed {
            name: "fs-1".to_string(),
            url: "http://fs-1.invalid/".to_string(),
            enabled: true,
            statistics_interval_secs: None,
            list_interval_secs: None,
            min_free_disk_space: None,
        },
        AgentSeed {
            name: "fs-2".to_string(),
            url: "http://fs-2.invalid/".to_string(),
            enabled: false,
            statistics_interval_secs: Some(60),
            list_interval_secs: None,
            min_free_disk_space: None,
        },
    ];

    assert_eq!(orchestrator.bootstrap_agents(&seeds).await.unwrap(), 2);
    assert_eq!(orchestrator.bootstrap_agents(&seeds).await.unwrap(), 0);

    let stored = harness.store.find_agent_by_name("fs-2").unwrap().unwrap();
    assert!(!stored.enabled);
    assert_eq!(stored.statistics_interval_secs, 60);
    assert_eq!(stored.list_interval_secs, 5);
    assert_eq!(orchestrator.agents().await.len(), 2);
}

#[tokio::test]
async fn test_allocation_policy_setting_overrides_config() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator(harness.settings(true));

    assert_eq!(orchestrator.allocation_policy(), AllocationPolicy::MostFree);
    orchestrator
        .set_allocation_policy(AllocationPolicy::Fill)
        .unwrap();
    assert_eq!(orchestrator.allocation_policy(), AllocationPolicy::Fill);

    // Persisted: a second orchestrator on the same store sees it.
    let other = harness.create_orchestrator(harness.settings(true));
    assert_eq!(other.allocation_policy(), AllocationPolicy::Fill);
}

#[tokio::test]
async fn test_most_free_policy_picks_roomiest_agent() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator(harness.settings(true));
    orchestrator.start().await.unwrap();

    let (small, small_client) = harness.add_agent(&orchestrator, "small").await;
    let (large, large_client) = harness.add_agent(&orchestrator, "large").await;
    small_client.set_free_space(1 << 30).await;
    large_client.set_free_space(1 << 40).await;
    orchestrator.poll_agent(&small.id).await.unwrap();
    orchestrator.poll_agent(&large.id).await.unwrap();

    let (id, _) = harness
        .intake(&orchestrator, TestHarness::new_release("Placed-GRP"))
        .await;
    orchestrator.tick().await;

    let stored = harness.store.get_release(&id).unwrap().unwrap();
    assert_eq!(stored.agent_id.as_deref(), Some(large.id.as_str()));
    assert!(small_client.added().await.is_empty());

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_restart_recovers_live_releases() {
    let harness = TestHarness::new();
    let (id, hash) = {
        let orchestrator = harness.create_orchestrator(harness.settings(true));
        orchestrator.start().await.unwrap();
        harness.add_agent(&orchestrator, "fs-1").await;
        let ids = harness
            .intake(&orchestrator, TestHarness::new_release("Recovered-GRP"))
            .await;
        orchestrator.tick().await;
        orchestrator.shutdown().await;
        ids
    };
    assert_eq!(harness.state(&id), Some(ReleaseState::DownloadInit));

    let orchestrator = harness.create_orchestrator(harness.settings(true));
    orchestrator.start().await.unwrap();

    assert!(orchestrator.working_set().contains(&hash).await);
    assert_eq!(orchestrator.agents().await.len(), 1);
    let status = orchestrator.status().await;
    assert!(status.running);
    assert_eq!(status.working_set, 1);
    assert_eq!(status.count(ReleaseState::DownloadInit), 1);

    // Progress continues with the recovered agent.
    let agent = orchestrator.agents().await[0].agent.clone();
    let client = harness.connector.client(&agent.id);
    client.set_download(&hash, DownloadState::Started, 10.0).await;
    orchestrator.poll_agent(&agent.id).await.unwrap();
    orchestrator.tick().await;
    assert!(
        harness
            .wait_for_state(&id, ReleaseState::Downloading, Duration::from_secs(2))
            .await
    );

    orchestrator.shutdown().await;
    assert!(!orchestrator.is_running());
}
