//! The single intake consumer.
//!
//! Every classified release passes through one task, in order. Duplicate
//! detection therefore never races with another insert.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::events::{EventBus, LifecycleEvent};
use crate::metrics;
use crate::orchestrator::WorkingSet;
use crate::release::NewRelease;
use crate::store::{ArtifactStore, Store, StoreError};

use super::lookup::ReleaseLookup;
use super::policy::AcceptPolicy;
use super::types::IntakeError;

/// What happened to one release at intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    Accepted,
    Duplicate,
    TooOld,
    Rejected(String),
}

impl IntakeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntakeOutcome::Accepted => "accepted",
            IntakeOutcome::Duplicate => "duplicate",
            IntakeOutcome::TooOld => "too_old",
            IntakeOutcome::Rejected(_) => "rejected",
        }
    }
}

/// Producer side of the intake channel. Cheap to clone.
#[derive(Clone)]
pub struct IntakeHandle {
    tx: mpsc::Sender<NewRelease>,
}

impl IntakeHandle {
    /// Hand a release to the consumer, waiting while the channel is full.
    pub async fn submit(&self, release: NewRelease) -> Result<(), IntakeError> {
        self.tx
            .send(release)
            .await
            .map_err(|_| IntakeError::ChannelClosed)
    }
}

/// Settings the intake consumer needs.
#[derive(Debug, Clone)]
pub struct IntakeSettings {
    /// Zero disables the age check.
    pub max_age_minutes: u64,
    pub lookup_timeout: Duration,
}

/// Consumes classified releases: dedup, lookup, age check, accept policy,
/// persist, and insert into the working set.
pub struct IntakeWorker {
    rx: mpsc::Receiver<NewRelease>,
    store: Arc<dyn Store>,
    artifacts: ArtifactStore,
    working_set: Arc<WorkingSet>,
    events: EventBus,
    lookup: Arc<dyn ReleaseLookup>,
    policy: Arc<dyn AcceptPolicy>,
    settings: IntakeSettings,
}

impl IntakeWorker {
    /// Consume releases until shutdown or until every producer is dropped.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!("Intake worker started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Intake worker received shutdown signal");
                    break;
                }
                next = self.rx.recv() => {
                    let Some(new_release) = next else {
                        break;
                    };
                    let name = new_release.release.name.clone();
                    match self.process(new_release).await {
                        Ok(outcome) => {
                            metrics::INTAKE_DECISIONS.with_label_values(&[outcome.as_str()]).inc();
                        }
                        Err(e) => {
                            error!("Intake of {} failed: {}", name, e);
                            metrics::INTAKE_DECISIONS.with_label_values(&["failed"]).inc();
                        }
                    }
                }
            }
        }
        info!("Intake worker shutting down");
    }

    /// Run one release through intake.
    pub async fn process(&self, new_release: NewRelease) -> Result<IntakeOutcome, IntakeError> {
        let NewRelease {
            mut release,
            artifacts,
        } = new_release;

        if self.working_set.contains(&release.hash).await
            || self.store.release_exists(&release.hash, &release.name)?
        {
            debug!("Dropping duplicate release {} ({})", release.name, release.hash);
            return Ok(IntakeOutcome::Duplicate);
        }

        match tokio::time::timeout(self.settings.lookup_timeout, self.lookup.lookup(&release.name))
            .await
        {
            Ok(Ok(found)) => {
                release.published_at = found.published_at;
                release.category = found.category;
                release.category_raw = found.category_raw;
            }
            Ok(Err(e)) => warn!("Lookup for {} failed: {}", release.name, e),
            Err(_) => warn!("Lookup for {} timed out", release.name),
        }

        if self.settings.max_age_minutes > 0 {
            if let Some(published_at) = release.published_at {
                let age = Utc::now() - published_at;
                if age.num_minutes() > self.settings.max_age_minutes as i64 {
                    info!(
                        "Dropping {}: published {} minutes ago",
                        release.name,
                        age.num_minutes()
                    );
                    return Ok(IntakeOutcome::TooOld);
                }
            }
        }

        if let crate::intake::Decision::Reject(reason) = self.policy.decide(&release) {
            info!("Rejected {}: {}", release.name, reason);
            return Ok(IntakeOutcome::Rejected(reason));
        }

        for (file_name, bytes) in &artifacts {
            self.artifacts.write(&release.id, file_name, bytes).await?;
        }

        match self.store.insert_release(&release) {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                self.discard_artifacts(&release.id).await;
                return Ok(IntakeOutcome::Duplicate);
            }
            Err(e) => {
                self.discard_artifacts(&release.id).await;
                return Err(e.into());
            }
        }

        if let Some(source_id) = &release.source_id {
            if let Err(e) = self.store.increment_source_releases(source_id) {
                warn!("Failed to count release for source {}: {}", source_id, e);
            }
        }

        info!(
            "Added release {} ({}, {}, {} bytes)",
            release.name, release.hash, release.category, release.size
        );
        self.events.publish(LifecycleEvent::ReleaseAdded {
            release_id: release.id.clone(),
            hash: release.hash.clone(),
            name: release.name.clone(),
        });
        metrics::RELEASE_TRANSITIONS
            .with_label_values(&[release.state.as_str()])
            .inc();
        self.working_set.insert(release).await;

        Ok(IntakeOutcome::Accepted)
    }

    async fn discard_artifacts(&self, release_id: &str) {
        if let Err(e) = self.artifacts.remove_release(release_id).await {
            warn!("Failed to remove artifacts of {}: {}", release_id, e);
        }
    }
}

/// Create the intake channel and its consumer.
///
/// Returns:
/// - `IntakeHandle` - for submitting releases (clone this to share across tasks)
/// - `IntakeWorker` - spawn this as a background task with `tokio::spawn(worker.run(shutdown))`
#[allow(clippy::too_many_arguments)]
pub fn create_intake_system(
    buffer: usize,
    store: Arc<dyn Store>,
    artifacts: ArtifactStore,
    working_set: Arc<WorkingSet>,
    events: EventBus,
    lookup: Arc<dyn ReleaseLookup>,
    policy: Arc<dyn AcceptPolicy>,
    settings: IntakeSettings,
) -> (IntakeHandle, IntakeWorker) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let worker = IntakeWorker {
        rx,
        store,
        artifacts,
        working_set,
        events,
        lookup,
        policy,
        settings,
    };
    (IntakeHandle { tx }, worker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{AcceptAll, CategoryFilter, FiltersConfig, LookupResult};
    use crate::release::{classify, Category, ReleaseState};
    use crate::samples::SamplesConfig;
    use crate::store::SqliteStore;
    use crate::testing::{fixtures, MockLookup, RecordingSubscriber};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<dyn Store>,
        working_set: Arc<WorkingSet>,
        events: EventBus,
        lookup: Arc<MockLookup>,
        worker: IntakeWorker,
        handle: IntakeHandle,
    }

    fn fixture(policy: Arc<dyn AcceptPolicy>, max_age_minutes: u64) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let working_set = Arc::new(WorkingSet::new());
        let events = EventBus::new();
        let lookup = Arc::new(MockLookup::new());
        let (handle, worker) = create_intake_system(
            10,
            store.clone(),
            ArtifactStore::new(dir.path()),
            working_set.clone(),
            events.clone(),
            lookup.clone(),
            policy,
            IntakeSettings {
                max_age_minutes,
                lookup_timeout: Duration::from_secs(1),
            },
        );
        Fixture {
            _dir: dir,
            store,
            working_set,
            events,
            lookup,
            worker,
            handle,
        }
    }

    fn new_release(name: &str) -> NewRelease {
        let bytes = fixtures::structure_bytes(
            name,
            &[(&format!("{}.nfo", name), 100), (&format!("{}.mkv", name), 5000)],
        );
        classify(name, None, bytes, None, &SamplesConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_accepted_release_is_stored_and_tracked() {
        let f = fixture(Arc::new(AcceptAll), 0);
        let recorder = Arc::new(RecordingSubscriber::new());
        f.events.subscribe(recorder.clone());
        f.lookup.set_result(LookupResult {
            published_at: Some(Utc::now()),
            category: Category::Movie,
            category_raw: "X264".to_string(),
        });

        let new = new_release("Some.Movie-GRP");
        let hash = new.release.hash.clone();
        let outcome = f.worker.process(new).await.unwrap();

        assert_eq!(outcome, IntakeOutcome::Accepted);
        let stored = f.store.find_release_by_hash(&hash).unwrap().unwrap();
        assert_eq!(stored.category, Category::Movie);
        assert_eq!(stored.state, ReleaseState::New);
        assert!(f.working_set.contains(&hash).await);
        assert_eq!(recorder.events().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_hash_or_name_is_dropped() {
        let f = fixture(Arc::new(AcceptAll), 0);
        let first = new_release("Some.Movie-GRP");
        let again = first.clone();

        assert_eq!(f.worker.process(first).await.unwrap(), IntakeOutcome::Accepted);
        assert_eq!(f.worker.process(again).await.unwrap(), IntakeOutcome::Duplicate);

        // Same name, different content.
        let mut renamed = new_release("Other-GRP");
        renamed.release.name = "Some.Movie-GRP".to_string();
        assert_eq!(f.worker.process(renamed).await.unwrap(), IntakeOutcome::Duplicate);
    }

    /// Stores a copy of the release under another id while the lookup runs.
    struct RacingLookup {
        store: Arc<dyn Store>,
        rival: crate::release::Release,
    }

    #[async_trait::async_trait]
    impl ReleaseLookup for RacingLookup {
        async fn lookup(&self, _name: &str) -> Result<LookupResult, IntakeError> {
            self.store.insert_release(&self.rival)?;
            Err(IntakeError::Lookup("unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_release_stored_concurrently_is_duplicate_and_files_are_discarded() {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let working_set = Arc::new(WorkingSet::new());

        let new = new_release("Raced-GRP");
        let mut rival = new.release.clone();
        rival.id = "rival".to_string();
        rival.meta_files.clear();

        let (_handle, worker) = create_intake_system(
            10,
            store.clone(),
            ArtifactStore::new(dir.path()),
            working_set.clone(),
            EventBus::new(),
            Arc::new(RacingLookup {
                store: store.clone(),
                rival,
            }),
            Arc::new(AcceptAll),
            IntakeSettings {
                max_age_minutes: 0,
                lookup_timeout: Duration::from_secs(1),
            },
        );

        let id = new.release.id.clone();
        let hash = new.release.hash.clone();
        assert_eq!(worker.process(new).await.unwrap(), IntakeOutcome::Duplicate);
        assert!(!dir.path().join(&id).exists());
        assert!(!working_set.contains(&hash).await);
        assert_eq!(
            store.find_release_by_hash(&hash).unwrap().unwrap().id,
            "rival"
        );
    }

    #[tokio::test]
    async fn test_lookup_failure_leaves_category_unknown() {
        let f = fixture(Arc::new(AcceptAll), 0);
        f.lookup.set_error("service down");

        let new = new_release("Some.Movie-GRP");
        let hash = new.release.hash.clone();
        assert_eq!(f.worker.process(new).await.unwrap(), IntakeOutcome::Accepted);

        let stored = f.store.find_release_by_hash(&hash).unwrap().unwrap();
        assert_eq!(stored.category, Category::Unknown);
        assert!(stored.published_at.is_none());
    }

    #[tokio::test]
    async fn test_old_release_is_dropped() {
        let f = fixture(Arc::new(AcceptAll), 30);
        f.lookup.set_result(LookupResult {
            published_at: Some(Utc::now() - chrono::Duration::hours(2)),
            ..Default::default()
        });

        let outcome = f.worker.process(new_release("Old-GRP")).await.unwrap();
        assert_eq!(outcome, IntakeOutcome::TooOld);
        assert!(f.working_set.is_empty().await);
    }

    #[tokio::test]
    async fn test_policy_rejection() {
        let config: FiltersConfig =
            toml::from_str("[categories.movie]\nenabled = false\n").unwrap();
        let f = fixture(Arc::new(CategoryFilter::new(&config)), 0);
        f.lookup.set_result(LookupResult {
            category: Category::Movie,
            ..Default::default()
        });

        let outcome = f.worker.process(new_release("Some.Movie-GRP")).await.unwrap();
        assert!(matches!(outcome, IntakeOutcome::Rejected(_)));
        assert!(f.store.list_releases(&Default::default()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_channel_feeds_worker() {
        let f = fixture(Arc::new(AcceptAll), 0);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let Fixture {
            worker,
            handle,
            working_set,
            _dir,
            ..
        } = f;
        let task = tokio::spawn(worker.run(shutdown_rx));

        handle.submit(new_release("A-GRP")).await.unwrap();
        handle.submit(new_release("B-GRP")).await.unwrap();

        for _ in 0..100 {
            if working_set.len().await == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(working_set.len().await, 2);

        let _ = shutdown_tx.send(());
        task.await.unwrap();
    }
}
