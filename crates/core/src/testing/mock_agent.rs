//! Mock download agent for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Notify, RwLock};

use crate::agent::{
    AddResult, Agent, AgentClient, AgentConnector, AgentError, AgentStatistics, DownloadEntry,
    DownloadState, FileStatus,
};
use crate::codec::Structure;

/// A recorded `add` call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAdd {
    pub metadata: Vec<u8>,
    pub file_name: String,
    pub label: String,
}

/// Holds `download_file` calls until the test lets them continue.
#[derive(Debug, Default)]
pub struct DownloadGate {
    /// Signalled when a download reaches the gate.
    pub entered: Notify,
    /// Signal to let the held download finish.
    pub proceed: Notify,
}

/// Mock implementation of the [`AgentClient`] trait.
///
/// Provides controllable behavior for testing:
/// - Track submitted structures for assertions
/// - Control download progress and finished files
/// - Simulate failures
///
/// # Example
///
/// ```rust,ignore
/// let agent = MockAgentClient::new();
/// agent.set_download("abcd", DownloadState::Started, 100.0).await;
/// agent.set_file("abcd", 0, b"nfo".to_vec()).await;
/// ```
#[derive(Debug)]
pub struct MockAgentClient {
    statistics: Arc<RwLock<AgentStatistics>>,
    /// Download list by lowercase hash.
    downloads: Arc<RwLock<HashMap<String, DownloadEntry>>>,
    /// Finished structural files by (lowercase hash, index).
    files: Arc<RwLock<HashMap<(String, i64), Vec<u8>>>>,
    added: Arc<RwLock<Vec<RecordedAdd>>>,
    /// Overrides the hash `add` reports.
    add_hash: Arc<RwLock<Option<String>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<AgentError>>>,
    /// If set, every operation fails with this error until cleared.
    offline: Arc<RwLock<Option<AgentError>>>,
    download_gate: Arc<RwLock<Option<Arc<DownloadGate>>>>,
}

impl Default for MockAgentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAgentClient {
    /// A reachable agent with 1 TiB free and nothing downloading.
    pub fn new() -> Self {
        Self {
            statistics: Arc::new(RwLock::new(AgentStatistics {
                server_load: vec![0.1, 0.1, 0.1],
                disk_total_space: 2 << 40,
                disk_free_space: 1 << 40,
            })),
            downloads: Arc::new(RwLock::new(HashMap::new())),
            files: Arc::new(RwLock::new(HashMap::new())),
            added: Arc::new(RwLock::new(Vec::new())),
            add_hash: Arc::new(RwLock::new(None)),
            next_error: Arc::new(RwLock::new(None)),
            offline: Arc::new(RwLock::new(None)),
            download_gate: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn set_statistics(&self, statistics: AgentStatistics) {
        *self.statistics.write().await = statistics;
    }

    pub async fn set_free_space(&self, free: i64) {
        let mut statistics = self.statistics.write().await;
        statistics.disk_free_space = free;
        statistics.disk_total_space = statistics.disk_total_space.max(free);
    }

    /// Put `hash` in the download list at `done` percent.
    pub async fn set_download(&self, hash: &str, state: DownloadState, done: f64) {
        let hash = hash.to_lowercase();
        self.downloads.write().await.insert(
            hash.clone(),
            DownloadEntry {
                hash,
                state,
                download_rate: if done >= 100.0 { 0 } else { 1024 },
                done,
                eta: 0,
            },
        );
    }

    pub async fn remove_download(&self, hash: &str) {
        self.downloads.write().await.remove(&hash.to_lowercase());
    }

    /// Mark a structural file of `hash` as finished with these bytes.
    pub async fn set_file(&self, hash: &str, index: i64, bytes: Vec<u8>) {
        self.files
            .write()
            .await
            .insert((hash.to_lowercase(), index), bytes);
    }

    /// Report `hash` from every subsequent `add` instead of the real one.
    pub async fn set_add_hash(&self, hash: &str) {
        *self.add_hash.write().await = Some(hash.to_string());
    }

    pub async fn set_next_error(&self, error: AgentError) {
        *self.next_error.write().await = Some(error);
    }

    /// Fail every call until [`MockAgentClient::set_online`].
    pub async fn set_offline(&self) {
        *self.offline.write().await = Some(AgentError::ConnectionFailed(
            "mock agent offline".to_string(),
        ));
    }

    pub async fn set_online(&self) {
        *self.offline.write().await = None;
    }

    /// Make every later `download_file` wait at the returned gate.
    pub async fn hold_downloads(&self) -> Arc<DownloadGate> {
        let gate = Arc::new(DownloadGate::default());
        *self.download_gate.write().await = Some(gate.clone());
        gate
    }

    pub async fn added(&self) -> Vec<RecordedAdd> {
        self.added.read().await.clone()
    }

    async fn check_error(&self) -> Result<(), AgentError> {
        if let Some(error) = self.offline.read().await.clone() {
            return Err(error);
        }
        match self.next_error.write().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AgentClient for MockAgentClient {
    async fn statistics(&self) -> Result<AgentStatistics, AgentError> {
        self.check_error().await?;
        Ok(self.statistics.read().await.clone())
    }

    async fn list(&self, _label: &str) -> Result<Vec<DownloadEntry>, AgentError> {
        self.check_error().await?;
        let mut entries: Vec<_> = self.downloads.read().await.values().cloned().collect();
        entries.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(entries)
    }

    async fn add(
        &self,
        metadata: Vec<u8>,
        file_name: &str,
        label: &str,
    ) -> Result<AddResult, AgentError> {
        self.check_error().await?;
        let hash = match self.add_hash.read().await.clone() {
            Some(hash) => hash,
            None => Structure::decode(&metadata)
                .map_err(|e| AgentError::Api {
                    status: 400,
                    body: e.to_string(),
                })?
                .hash(),
        };

        self.added.write().await.push(RecordedAdd {
            metadata,
            file_name: file_name.to_string(),
            label: label.to_string(),
        });
        Ok(AddResult { hash })
    }

    async fn file_status(
        &self,
        hash: &str,
        indices: &[i64],
    ) -> Result<Vec<FileStatus>, AgentError> {
        self.check_error().await?;
        let hash = hash.to_lowercase();
        let files = self.files.read().await;
        Ok(indices
            .iter()
            .map(|&index| FileStatus {
                index,
                completed: files.contains_key(&(hash.clone(), index)),
            })
            .collect())
    }

    async fn download_file(&self, hash: &str, index: i64) -> Result<Vec<u8>, AgentError> {
        self.check_error().await?;
        let gate = self.download_gate.read().await.clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.proceed.notified().await;
        }
        self.files
            .read()
            .await
            .get(&(hash.to_lowercase(), index))
            .cloned()
            .ok_or_else(|| AgentError::NotFound(format!("{} file {}", hash, index)))
    }
}

/// Mock [`AgentConnector`] handing out one [`MockAgentClient`] per agent id.
///
/// Clients are created on first connect and kept, so a test can reach the
/// client of an agent the orchestrator registered.
#[derive(Debug, Default)]
pub struct MockConnector {
    clients: Mutex<HashMap<String, Arc<MockAgentClient>>>,
    fail_connect: Mutex<bool>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The client of agent `id`, creating it if nothing connected yet.
    pub fn client(&self, id: &str) -> Arc<MockAgentClient> {
        let mut clients = match self.clients.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            clients
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(MockAgentClient::new())),
        )
    }

    /// Use `client` for agent `id` from now on.
    pub fn set_client(&self, id: &str, client: Arc<MockAgentClient>) {
        let mut clients = match self.clients.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        clients.insert(id.to_string(), client);
    }

    pub fn set_fail_connect(&self, fail: bool) {
        let mut guard = match self.fail_connect.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = fail;
    }
}

impl AgentConnector for MockConnector {
    fn connect(&self, agent: &Agent) -> Result<Arc<dyn AgentClient>, AgentError> {
        let fail = match self.fail_connect.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        if fail {
            return Err(AgentError::ConnectionFailed(agent.url.clone()));
        }
        let client: Arc<dyn AgentClient> = self.client(&agent.id);
        Ok(client)
    }
}
