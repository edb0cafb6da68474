//! Release orchestrator implementation.
//!
//! One [`Orchestrator`] owns every piece of mutable state of a running
//! instance. Periodic work runs on schedulers:
//! - one tick stepping every live release through the state machine
//! - per agent: statistics poll, download list poll, meta file poll
//! - per source: discovery poll
//!
//! plus the single intake consumer and the single sample consumer.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Url;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::agent::{
    Agent, AgentConnector, AgentRegistry, AgentSeed, AgentSnapshot, AllocationPolicy, LiveAgent,
};
use crate::events::{EventBus, LifecycleEvent};
use crate::intake::{
    create_intake_system, AcceptPolicy, IntakeHandle, IntakeSettings, IntakeWorker,
    ReleaseLookup, SourceConnector, SourcePoller, SourceRecord, SourceSeed,
};
use crate::release::{MetaFileKind, MetaFileState, NewRelease, Release, ReleaseState};
use crate::samples::{create_sample_system, SampleProcessor, SampleQueue, SampleWorker};
use crate::scheduler::{task_fn, Scheduler};
use crate::store::{ArtifactStore, ReleaseFilter, Store, StoreError, ALLOCATION_METHOD_KEY};
use crate::upload::{Destination, UploadCoordinator, UploadError};

use super::types::{AgentUpdate, OrchestratorError, OrchestratorSettings, OrchestratorStatus};
use super::working_set::WorkingSet;

/// External collaborators of an orchestrator.
pub struct OrchestratorParts {
    pub store: Arc<dyn Store>,
    pub artifacts: ArtifactStore,
    pub agents: Arc<dyn AgentConnector>,
    pub sources: Arc<dyn SourceConnector>,
    pub lookup: Arc<dyn ReleaseLookup>,
    pub policy: Arc<dyn AcceptPolicy>,
    pub destination: Arc<dyn Destination>,
    pub sample_processor: Arc<dyn SampleProcessor>,
    pub events: EventBus,
}

/// State shared between the orchestrator and its scheduler tasks.
pub(super) struct Shared {
    pub(super) settings: OrchestratorSettings,
    pub(super) store: Arc<dyn Store>,
    pub(super) artifacts: ArtifactStore,
    pub(super) working_set: Arc<WorkingSet>,
    pub(super) registry: AgentRegistry,
    pub(super) events: EventBus,
    pub(super) intake: IntakeHandle,
    pub(super) sample_queue: SampleQueue,
    pub(super) uploader: UploadCoordinator,
    /// Release id to the first tick its agent was found unavailable.
    pub(super) stalled_since: Mutex<HashMap<String, DateTime<Utc>>>,
}

/// The release orchestrator.
pub struct Orchestrator {
    shared: Arc<Shared>,
    sources: Arc<dyn SourceConnector>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    tick_scheduler: StdMutex<Option<Scheduler>>,
    source_schedulers: StdMutex<HashMap<String, Scheduler>>,
    workers: StdMutex<Option<(IntakeWorker, SampleWorker)>>,
}

impl Orchestrator {
    /// Create a new orchestrator. Nothing runs until [`Orchestrator::start`].
    pub fn new(settings: OrchestratorSettings, parts: OrchestratorParts) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let working_set = Arc::new(WorkingSet::new());

        let (intake, intake_worker) = create_intake_system(
            settings.orchestrator.intake_buffer,
            Arc::clone(&parts.store),
            parts.artifacts.clone(),
            Arc::clone(&working_set),
            parts.events.clone(),
            parts.lookup,
            parts.policy,
            IntakeSettings {
                max_age_minutes: settings.max_age_minutes,
                lookup_timeout: settings.orchestrator.lookup_timeout(),
            },
        );
        let (sample_queue, sample_worker) = create_sample_system(
            settings.orchestrator.sample_queue_capacity,
            Arc::clone(&parts.store),
            parts.artifacts.clone(),
            Arc::clone(&working_set),
            parts.events.clone(),
            parts.sample_processor,
        );
        let uploader = UploadCoordinator::new(
            settings.upload.clone(),
            parts.destination,
            parts.artifacts.clone(),
            settings.orchestrator.upload_label.clone(),
        );

        let shared = Arc::new(Shared {
            settings,
            store: parts.store,
            artifacts: parts.artifacts,
            working_set,
            registry: AgentRegistry::new(parts.agents),
            events: parts.events,
            intake,
            sample_queue,
            uploader,
            stalled_since: Mutex::new(HashMap::new()),
        });

        Self {
            shared,
            sources: parts.sources,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            tick_scheduler: StdMutex::new(None),
            source_schedulers: StdMutex::new(HashMap::new()),
            workers: StdMutex::new(Some((intake_worker, sample_worker))),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.shared.store)
    }

    pub fn working_set(&self) -> Arc<WorkingSet> {
        Arc::clone(&self.shared.working_set)
    }

    /// Producer side of the intake channel.
    pub fn intake(&self) -> IntakeHandle {
        self.shared.intake.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the orchestrator (spawns background tasks).
    ///
    /// Live releases are reloaded from the store, stored agents are
    /// registered, and downloaded samples are offered again.
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return Ok(());
        }

        info!("Starting release orchestrator");

        let workers = lock(&self.workers).take();
        match workers {
            Some((intake_worker, sample_worker)) => {
                tokio::spawn(intake_worker.run(self.shutdown_tx.subscribe()));
                tokio::spawn(sample_worker.run(self.shutdown_tx.subscribe()));
            }
            None => warn!("Orchestrator workers already consumed, intake and samples stay stopped"),
        }

        self.recover_releases().await?;

        for record in self.shared.store.list_agents()? {
            let live = match self.shared.registry.get(&record.id).await {
                Some(live) => live,
                None => match self.shared.registry.register(record).await {
                    Ok(live) => live,
                    Err(e) => {
                        error!("Failed to register agent: {}", e);
                        continue;
                    }
                },
            };
            if live.is_enabled().await {
                self.start_agent(&live).await;
            }
        }

        for record in self.shared.store.list_sources()? {
            if record.enabled {
                self.start_source(&record);
            }
        }

        let shared = Arc::clone(&self.shared);
        let tick = Scheduler::new(
            "orchestrator-tick",
            self.shared.settings.orchestrator.tick_interval(),
            task_fn(move |_| {
                let shared = Arc::clone(&shared);
                async move { shared.tick().await }
            }),
        );
        tick.run(false);
        if let Some(previous) = lock(&self.tick_scheduler).replace(tick) {
            previous.stop();
        }

        info!("Release orchestrator started");
        Ok(())
    }

    /// Stop every scheduler, then the intake and sample consumers.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return;
        }

        info!("Stopping release orchestrator");

        if let Some(tick) = lock(&self.tick_scheduler).take() {
            tick.stop();
        }
        for (_, scheduler) in lock(&self.source_schedulers).drain() {
            scheduler.stop();
        }
        self.shared.registry.stop_all().await;

        let _ = self.shutdown_tx.send(());

        info!("Release orchestrator stopped");
    }

    /// One reconciliation pass, as run by the tick scheduler.
    pub async fn tick(&self) {
        self.shared.tick().await;
    }

    /// Run every periodic poll of one agent once: statistics, download
    /// list, meta files.
    pub async fn poll_agent(&self, id: &str) -> Result<(), OrchestratorError> {
        let live = self.live_agent(id).await?;
        live.poll_statistics().await?;
        live.poll_downloads(
            &self.shared.settings.orchestrator.download_label,
            &self.shared.events,
        )
        .await?;
        self.shared.poll_meta_files(&live).await;
        Ok(())
    }

    /// Hand a classified release to intake.
    pub async fn submit(&self, release: NewRelease) -> Result<(), OrchestratorError> {
        Ok(self.shared.intake.submit(release).await?)
    }

    /// Current status of the orchestrator.
    pub async fn status(&self) -> OrchestratorStatus {
        let releases_by_state: BTreeMap<String, i64> =
            match self.shared.store.count_releases_by_state() {
                Ok(counts) => counts
                    .into_iter()
                    .map(|(state, count)| (state.as_str().to_string(), count))
                    .collect(),
                Err(e) => {
                    warn!("Failed to count releases: {}", e);
                    BTreeMap::new()
                }
            };
        let sources = self
            .shared
            .store
            .list_sources()
            .map(|s| s.len())
            .unwrap_or(0);

        OrchestratorStatus {
            running: self.is_running(),
            working_set: self.shared.working_set.len().await,
            releases_by_state,
            agents: self.shared.registry.len().await,
            sources,
            sample_queue_depth: self.shared.sample_queue.depth(),
            sample_queue_capacity: self.shared.sample_queue.capacity(),
            stalled: self.shared.stalled_count().await,
        }
    }

    async fn recover_releases(&self) -> Result<(), OrchestratorError> {
        let releases = self.shared.store.list_releases(&ReleaseFilter::live())?;
        let count = releases.len();
        let mut samples = Vec::new();

        for release in releases {
            for meta_file in &release.meta_files {
                if meta_file.kind == MetaFileKind::SampleVideo
                    && meta_file.state == MetaFileState::Downloaded
                {
                    samples.push((release.id.clone(), release.hash.clone(), meta_file.id.clone()));
                }
            }
            self.shared.working_set.insert(release).await;
        }
        for (release_id, hash, meta_file_id) in samples {
            self.shared.offer_sample(&release_id, &hash, meta_file_id);
        }

        if count > 0 {
            info!("Recovered {} live releases", count);
        }
        Ok(())
    }

    // -- Releases ---------------------------------------------------------

    /// Live releases, oldest first.
    pub async fn releases(&self) -> Vec<Release> {
        self.shared.working_set.snapshot().await
    }

    /// A release from the working set, or from the store if it is no longer
    /// live.
    pub async fn release(&self, id: &str) -> Result<Release, OrchestratorError> {
        if let Some(handle) = self.shared.working_set.find_by_id(id).await {
            return Ok(handle.lock().await.clone());
        }
        self.shared
            .store
            .get_release(id)?
            .ok_or_else(|| OrchestratorError::ReleaseNotFound(id.to_string()))
    }

    /// Run the upload step for a release that is downloaded or whose upload
    /// failed. Returns the release after the attempt.
    pub async fn retry_upload(&self, id: &str) -> Result<Release, OrchestratorError> {
        if !self.shared.uploader.is_configured() {
            return Err(UploadError::NotConfigured.into());
        }

        if let Some(handle) = self.shared.working_set.find_by_id(id).await {
            let (release, terminal) = {
                let mut release = handle.lock().await;
                check_retryable(&release)?;
                self.shared.upload(&mut release).await;
                (release.clone(), release.state.is_terminal())
            };
            if terminal {
                self.shared.working_set.remove(&release.hash).await;
            }
            return Ok(release);
        }

        let mut release = self
            .shared
            .store
            .get_release(id)?
            .ok_or_else(|| OrchestratorError::ReleaseNotFound(id.to_string()))?;
        check_retryable(&release)?;
        info!("Manual upload of {}", release.name);
        self.shared.upload(&mut release).await;
        Ok(release)
    }

    /// Remove a release from the working set, the store, and disk.
    pub async fn delete_release(&self, id: &str) -> Result<Release, OrchestratorError> {
        let deleted = match self.shared.store.delete_release(id) {
            Ok(release) => release,
            Err(StoreError::NotFound(_)) => {
                return Err(OrchestratorError::ReleaseNotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        self.shared.working_set.remove(&deleted.hash).await;
        self.shared.clear_stalled(id).await;
        if let Err(e) = self.shared.artifacts.remove_release(id).await {
            warn!("Failed to remove artifacts of {}: {}", id, e);
        }

        info!("Deleted release {} ({})", deleted.name, deleted.hash);
        self.shared.events.publish(LifecycleEvent::ReleaseDeleted {
            release_id: id.to_string(),
        });
        Ok(deleted)
    }

    pub fn allocation_policy(&self) -> AllocationPolicy {
        self.shared.allocation_policy()
    }

    /// Persist an allocation policy overriding the configured one.
    pub fn set_allocation_policy(&self, policy: AllocationPolicy) -> Result<(), OrchestratorError> {
        self.shared
            .store
            .set_setting(ALLOCATION_METHOD_KEY, policy.as_str())?;
        info!("Allocation policy set to {}", policy);
        Ok(())
    }

    // -- Agents -----------------------------------------------------------

    /// Persist agents from the configuration that are not stored yet,
    /// matched by name. Returns how many were added.
    pub async fn bootstrap_agents(&self, seeds: &[AgentSeed]) -> Result<usize, OrchestratorError> {
        let mut added = 0;
        for seed in seeds {
            if self.shared.store.find_agent_by_name(&seed.name)?.is_some() {
                debug!("Agent {} already stored", seed.name);
                continue;
            }
            self.add_agent(seed.clone()).await?;
            added += 1;
        }
        Ok(added)
    }

    pub async fn add_agent(&self, seed: AgentSeed) -> Result<Agent, OrchestratorError> {
        validate_name(&seed.name)?;
        validate_url(&seed.url)?;

        let defaults = &self.shared.settings.agent_defaults;
        let agent = Agent {
            id: uuid::Uuid::new_v4().to_string(),
            name: seed.name,
            url: seed.url,
            enabled: seed.enabled,
            statistics_interval_secs: seed
                .statistics_interval_secs
                .unwrap_or(defaults.statistics_interval_secs),
            list_interval_secs: seed.list_interval_secs.unwrap_or(defaults.list_interval_secs),
            min_free_disk_space: seed
                .min_free_disk_space
                .unwrap_or(defaults.min_free_disk_space),
            files_submitted: 0,
            last_statistics_at: None,
            created_at: Utc::now(),
        };

        self.shared.store.insert_agent(&agent)?;
        let live = self.shared.registry.register(agent.clone()).await?;
        if self.is_running() && agent.enabled {
            self.start_agent(&live).await;
        }

        info!("Added agent {} ({})", agent.name, agent.id);
        self.shared.events.publish(LifecycleEvent::AgentUpdated {
            agent_id: agent.id.clone(),
            enabled: agent.enabled,
        });
        Ok(agent)
    }

    pub async fn update_agent(
        &self,
        id: &str,
        update: AgentUpdate,
    ) -> Result<Agent, OrchestratorError> {
        let live = self.live_agent(id).await?;
        let mut record = live.record().await;
        let mut reconnect = false;

        if let Some(name) = update.name {
            validate_name(&name)?;
            record.name = name;
        }
        if let Some(url) = update.url {
            validate_url(&url)?;
            reconnect |= url != record.url;
            record.url = url;
        }
        if let Some(interval) = update.statistics_interval_secs {
            reconnect |= interval != record.statistics_interval_secs;
            record.statistics_interval_secs = interval;
        }
        if let Some(interval) = update.list_interval_secs {
            reconnect |= interval != record.list_interval_secs;
            record.list_interval_secs = interval;
        }
        if let Some(min_free) = update.min_free_disk_space {
            record.min_free_disk_space = min_free;
        }

        self.shared.store.update_agent(&record)?;

        if reconnect {
            let live = self.shared.registry.register(record.clone()).await?;
            if self.is_running() && record.enabled {
                self.start_agent(&live).await;
            }
        } else {
            live.update_record(record.clone()).await;
        }

        info!("Updated agent {} ({})", record.name, record.id);
        self.shared.events.publish(LifecycleEvent::AgentUpdated {
            agent_id: record.id.clone(),
            enabled: record.enabled,
        });
        Ok(record)
    }

    pub async fn enable_agent(&self, id: &str) -> Result<Agent, OrchestratorError> {
        self.set_agent_enabled(id, true).await
    }

    /// Stop polling an agent. Its cached state is kept and releases assigned
    /// to it wait.
    pub async fn disable_agent(&self, id: &str) -> Result<Agent, OrchestratorError> {
        self.set_agent_enabled(id, false).await
    }

    async fn set_agent_enabled(&self, id: &str, enabled: bool) -> Result<Agent, OrchestratorError> {
        let live = self.live_agent(id).await?;
        live.set_enabled(enabled).await;
        let record = live.record().await;
        self.shared.store.update_agent(&record)?;

        if !enabled {
            live.stop_schedulers();
        } else if self.is_running() {
            self.start_agent(&live).await;
        }

        info!(
            "Agent {} {}",
            record.name,
            if enabled { "enabled" } else { "disabled" }
        );
        self.shared.events.publish(LifecycleEvent::AgentUpdated {
            agent_id: record.id.clone(),
            enabled,
        });
        Ok(record)
    }

    /// Delete an agent. Refused while a live release is assigned to it.
    pub async fn delete_agent(&self, id: &str) -> Result<(), OrchestratorError> {
        for release in self.shared.working_set.snapshot().await {
            if release.agent_id.as_deref() == Some(id) {
                return Err(OrchestratorError::AgentInUse(id.to_string()));
            }
        }

        match self.shared.store.delete_agent(id) {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                return Err(OrchestratorError::AgentNotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        self.shared.registry.remove(id).await;
        info!("Deleted agent {}", id);
        Ok(())
    }

    pub async fn agents(&self) -> Vec<AgentSnapshot> {
        self.shared.registry.snapshots().await
    }

    async fn live_agent(&self, id: &str) -> Result<Arc<LiveAgent>, OrchestratorError> {
        self.shared
            .registry
            .get(id)
            .await
            .ok_or_else(|| OrchestratorError::AgentNotFound(id.to_string()))
    }

    /// Start the statistics, list and meta file schedulers of an agent.
    ///
    /// Tasks hold weak references: the agent owns its schedulers.
    async fn start_agent(&self, live: &Arc<LiveAgent>) {
        let record = live.record().await;

        let agent = Arc::downgrade(live);
        let statistics = Scheduler::new(
            format!("agent-{}-statistics", record.name),
            Duration::from_secs(record.statistics_interval_secs),
            task_fn(move |_| {
                let agent = agent.clone();
                async move {
                    if let Some(agent) = agent.upgrade() {
                        let _ = agent.poll_statistics().await;
                    }
                }
            }),
        );

        let agent = Arc::downgrade(live);
        let shared = Arc::downgrade(&self.shared);
        let list = Scheduler::new(
            format!("agent-{}-list", record.name),
            Duration::from_secs(record.list_interval_secs),
            task_fn(move |_| {
                let agent = agent.clone();
                let shared = shared.clone();
                async move {
                    if let (Some(agent), Some(shared)) = (agent.upgrade(), shared.upgrade()) {
                        let _ = agent
                            .poll_downloads(
                                &shared.settings.orchestrator.download_label,
                                &shared.events,
                            )
                            .await;
                    }
                }
            }),
        );

        let agent = Arc::downgrade(live);
        let shared = Arc::downgrade(&self.shared);
        let meta_files = Scheduler::new(
            format!("agent-{}-meta-files", record.name),
            self.shared.settings.orchestrator.meta_files_interval(),
            task_fn(move |_| {
                let agent = agent.clone();
                let shared = shared.clone();
                async move {
                    if let (Some(agent), Some(shared)) = (agent.upgrade(), shared.upgrade()) {
                        shared.poll_meta_files(&agent).await;
                    }
                }
            }),
        );

        statistics.run(true);
        list.run(true);
        meta_files.run(false);
        live.attach_schedulers(vec![statistics, list, meta_files]);
        debug!("Started schedulers of agent {}", record.name);
    }

    // -- Sources ----------------------------------------------------------

    /// Persist sources from the configuration that are not stored yet,
    /// matched by name. Returns how many were added.
    pub fn bootstrap_sources(&self, seeds: &[SourceSeed]) -> Result<usize, OrchestratorError> {
        let mut added = 0;
        for seed in seeds {
            if self.shared.store.find_source_by_name(&seed.name)?.is_some() {
                debug!("Source {} already stored", seed.name);
                continue;
            }
            self.add_source(seed.clone())?;
            added += 1;
        }
        Ok(added)
    }

    pub fn add_source(&self, seed: SourceSeed) -> Result<SourceRecord, OrchestratorError> {
        validate_name(&seed.name)?;
        validate_url(&seed.url)?;
        if seed.interval_secs == 0 {
            return Err(OrchestratorError::InvalidInput(
                "source interval must be positive".to_string(),
            ));
        }

        let record = SourceRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: seed.name,
            url: seed.url,
            enabled: seed.enabled,
            interval_secs: seed.interval_secs,
            last_check: None,
            times_checked: 0,
            releases_found: 0,
            created_at: Utc::now(),
        };
        self.shared.store.insert_source(&record)?;
        if self.is_running() && record.enabled {
            self.start_source(&record);
        }

        info!("Added source {} ({})", record.name, record.id);
        Ok(record)
    }

    pub fn enable_source(&self, id: &str) -> Result<SourceRecord, OrchestratorError> {
        self.set_source_enabled(id, true)
    }

    pub fn disable_source(&self, id: &str) -> Result<SourceRecord, OrchestratorError> {
        self.set_source_enabled(id, false)
    }

    fn set_source_enabled(&self, id: &str, enabled: bool) -> Result<SourceRecord, OrchestratorError> {
        let mut record = self
            .shared
            .store
            .get_source(id)?
            .ok_or_else(|| OrchestratorError::SourceNotFound(id.to_string()))?;
        record.enabled = enabled;
        self.shared.store.update_source(&record)?;

        if !enabled {
            if let Some(scheduler) = lock(&self.source_schedulers).remove(id) {
                scheduler.stop();
            }
        } else if self.is_running() {
            self.start_source(&record);
        }

        info!(
            "Source {} {}",
            record.name,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(record)
    }

    pub fn delete_source(&self, id: &str) -> Result<(), OrchestratorError> {
        if let Some(scheduler) = lock(&self.source_schedulers).remove(id) {
            scheduler.stop();
        }
        match self.shared.store.delete_source(id) {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => Err(OrchestratorError::SourceNotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub fn sources(&self) -> Result<Vec<SourceRecord>, OrchestratorError> {
        Ok(self.shared.store.list_sources()?)
    }

    fn start_source(&self, record: &SourceRecord) {
        let source = match self.sources.connect(record) {
            Ok(source) => source,
            Err(e) => {
                error!("Failed to connect source {}: {}", record.name, e);
                return;
            }
        };
        let poller = SourcePoller::new(
            record.id.clone(),
            source,
            Arc::clone(&self.shared.store),
            self.shared.intake.clone(),
            self.shared.settings.samples.clone(),
        );
        let scheduler = Scheduler::new(
            format!("source-{}", record.name),
            Duration::from_secs(record.interval_secs),
            Arc::new(poller),
        );
        scheduler.run(true);
        if let Some(previous) = lock(&self.source_schedulers).insert(record.id.clone(), scheduler) {
            previous.stop();
        }
        debug!("Started scheduler of source {}", record.name);
    }
}

/// Only downloaded or failed releases whose meta files have all settled can
/// be uploaded by hand.
fn check_retryable(release: &Release) -> Result<(), OrchestratorError> {
    match release.state {
        ReleaseState::Downloaded | ReleaseState::UploadError => {}
        other => {
            return Err(OrchestratorError::InvalidState {
                expected: "DOWNLOADED or UPLOAD_ERROR".to_string(),
                actual: other.to_string(),
            })
        }
    }
    if !release.meta_files_settled() {
        return Err(OrchestratorError::InvalidState {
            expected: "all meta files settled".to_string(),
            actual: format!("{} with unsettled meta files", release.state),
        });
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), OrchestratorError> {
    if name.trim().is_empty() {
        return Err(OrchestratorError::InvalidInput("name is empty".to_string()));
    }
    Ok(())
}

fn validate_url(url: &str) -> Result<(), OrchestratorError> {
    Url::parse(url)
        .map(|_| ())
        .map_err(|e| OrchestratorError::InvalidInput(format!("invalid URL {}: {}", url, e)))
}

fn lock<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
