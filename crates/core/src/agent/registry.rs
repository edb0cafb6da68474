//! Live view of the registered agents.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::events::{EventBus, LifecycleEvent};
use crate::metrics;
use crate::scheduler::Scheduler;

use super::{
    Agent, AgentClient, AgentConnector, AgentError, AgentSnapshot, AgentStatistics,
    AllocationCandidate, DownloadEntry,
};

/// One registered agent with its cached remote state.
///
/// Cached statistics and downloads survive failed polls so allocation keeps
/// working from the last known values.
pub struct LiveAgent {
    id: String,
    record: RwLock<Agent>,
    client: Arc<dyn AgentClient>,
    statistics: RwLock<Option<AgentStatistics>>,
    downloads: RwLock<HashMap<String, DownloadEntry>>,
    last_contact: RwLock<Option<DateTime<Utc>>>,
    unreachable_since: RwLock<Option<DateTime<Utc>>>,
    schedulers: Mutex<Vec<Scheduler>>,
}

impl LiveAgent {
    pub fn new(record: Agent, client: Arc<dyn AgentClient>) -> Self {
        Self {
            id: record.id.clone(),
            record: RwLock::new(record),
            client,
            statistics: RwLock::new(None),
            downloads: RwLock::new(HashMap::new()),
            last_contact: RwLock::new(None),
            unreachable_since: RwLock::new(None),
            schedulers: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn client(&self) -> Arc<dyn AgentClient> {
        Arc::clone(&self.client)
    }

    pub async fn record(&self) -> Agent {
        self.record.read().await.clone()
    }

    pub async fn is_enabled(&self) -> bool {
        self.record.read().await.enabled
    }

    pub async fn set_enabled(&self, enabled: bool) {
        self.record.write().await.enabled = enabled;
    }

    /// Replace the persisted record, keeping cached remote state.
    pub async fn update_record(&self, record: Agent) {
        *self.record.write().await = record;
    }

    /// Count one successful submission. Returns the updated record.
    pub async fn record_submission(&self) -> Agent {
        let mut record = self.record.write().await;
        record.files_submitted += 1;
        record.clone()
    }

    pub async fn statistics(&self) -> Option<AgentStatistics> {
        self.statistics.read().await.clone()
    }

    pub async fn last_contact(&self) -> Option<DateTime<Utc>> {
        *self.last_contact.read().await
    }

    /// When the agent first failed a poll after its last successful one.
    pub async fn unreachable_since(&self) -> Option<DateTime<Utc>> {
        *self.unreachable_since.read().await
    }

    /// Cached download list entry for `hash` (case-insensitive).
    pub async fn download(&self, hash: &str) -> Option<DownloadEntry> {
        self.downloads
            .read()
            .await
            .get(&hash.to_ascii_lowercase())
            .cloned()
    }

    pub async fn downloads(&self) -> Vec<DownloadEntry> {
        self.downloads.read().await.values().cloned().collect()
    }

    pub async fn candidate(&self) -> AllocationCandidate {
        let record = self.record.read().await;
        let statistics = self.statistics.read().await;
        AllocationCandidate {
            agent_id: record.id.clone(),
            enabled: record.enabled,
            free_space: statistics.as_ref().map(|s| s.disk_free_space),
            min_free_disk_space: record.min_free_disk_space,
        }
    }

    pub async fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            agent: self.record().await,
            statistics: self.statistics().await,
            last_contact: self.last_contact().await,
            tracked_downloads: self.downloads.read().await.len(),
        }
    }

    async fn mark_reachable(&self) {
        *self.last_contact.write().await = Some(Utc::now());
        *self.unreachable_since.write().await = None;
    }

    async fn mark_unreachable(&self, kind: &str, error: &AgentError) {
        warn!("Agent {} {} poll failed: {}", self.id, kind, error);
        metrics::AGENT_POLL_FAILURES
            .with_label_values(&[&self.id, kind])
            .inc();
        let mut since = self.unreachable_since.write().await;
        if since.is_none() {
            *since = Some(Utc::now());
        }
    }

    /// Refresh cached statistics. On failure the previous values stay.
    pub async fn poll_statistics(&self) -> Result<(), AgentError> {
        match self.client.statistics().await {
            Ok(statistics) => {
                debug!(
                    "Agent {} statistics: free={} total={}",
                    self.id, statistics.disk_free_space, statistics.disk_total_space
                );
                *self.statistics.write().await = Some(statistics);
                self.record.write().await.last_statistics_at = Some(Utc::now());
                self.mark_reachable().await;
                Ok(())
            }
            Err(e) => {
                self.mark_unreachable("statistics", &e).await;
                Err(e)
            }
        }
    }

    /// Refresh the cached download list for `label`, publishing a
    /// [`LifecycleEvent::DownloadStateChanged`] per changed entry.
    pub async fn poll_downloads(&self, label: &str, events: &EventBus) -> Result<(), AgentError> {
        let entries = match self.client.list(label).await {
            Ok(entries) => entries,
            Err(e) => {
                self.mark_unreachable("list", &e).await;
                return Err(e);
            }
        };
        self.mark_reachable().await;

        let fresh: HashMap<String, DownloadEntry> = entries
            .into_iter()
            .map(|entry| (entry.hash.to_ascii_lowercase(), entry))
            .collect();

        let mut cache = self.downloads.write().await;
        for (hash, entry) in &fresh {
            if cache.get(hash) != Some(entry) {
                events.publish(LifecycleEvent::DownloadStateChanged {
                    agent_id: self.id.clone(),
                    entry: entry.clone(),
                });
            }
        }
        *cache = fresh;

        Ok(())
    }

    /// Take ownership of the agent's periodic tasks, stopping any previous
    /// ones.
    pub fn attach_schedulers(&self, schedulers: Vec<Scheduler>) {
        let mut guard = match self.schedulers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for old in guard.drain(..) {
            old.stop();
        }
        *guard = schedulers;
    }

    /// Stop and drop the agent's periodic tasks. Cached state is kept.
    pub fn stop_schedulers(&self) {
        let mut guard = match self.schedulers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for scheduler in guard.drain(..) {
            scheduler.stop();
        }
    }

    pub fn has_running_schedulers(&self) -> bool {
        let guard = match self.schedulers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.iter().any(Scheduler::is_running)
    }
}

/// All agents known to one orchestrator instance, keyed by id.
pub struct AgentRegistry {
    connector: Arc<dyn AgentConnector>,
    agents: RwLock<HashMap<String, Arc<LiveAgent>>>,
}

impl AgentRegistry {
    pub fn new(connector: Arc<dyn AgentConnector>) -> Self {
        Self {
            connector,
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Connect to `record` and add it. A previous entry with the same id is
    /// replaced and its schedulers stopped.
    pub async fn register(&self, record: Agent) -> Result<Arc<LiveAgent>, AgentError> {
        let client = self.connector.connect(&record)?;
        let live = Arc::new(LiveAgent::new(record, client));

        let previous = self
            .agents
            .write()
            .await
            .insert(live.id().to_string(), Arc::clone(&live));
        if let Some(previous) = previous {
            previous.stop_schedulers();
        }

        info!("Registered agent {}", live.id());
        Ok(live)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<LiveAgent>> {
        self.agents.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<LiveAgent>> {
        let removed = self.agents.write().await.remove(id);
        if let Some(agent) = &removed {
            agent.stop_schedulers();
            info!("Removed agent {}", id);
        }
        removed
    }

    /// Agents sorted by id.
    pub async fn all(&self) -> Vec<Arc<LiveAgent>> {
        let mut agents: Vec<_> = self.agents.read().await.values().cloned().collect();
        agents.sort_by(|a, b| a.id().cmp(b.id()));
        agents
    }

    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }

    pub async fn candidates(&self) -> Vec<AllocationCandidate> {
        let mut candidates = Vec::new();
        for agent in self.all().await {
            candidates.push(agent.candidate().await);
        }
        candidates
    }

    pub async fn snapshots(&self) -> Vec<AgentSnapshot> {
        let mut snapshots = Vec::new();
        for agent in self.all().await {
            snapshots.push(agent.snapshot().await);
        }
        snapshots
    }

    pub async fn stop_all(&self) {
        for agent in self.all().await {
            agent.stop_schedulers();
        }
    }
}
