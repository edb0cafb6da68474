//! The agent protocol as a trait.

use std::sync::Arc;

use async_trait::async_trait;

use super::{AddResult, Agent, AgentError, AgentStatistics, DownloadEntry, FileStatus};

/// Client for one remote download agent.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Disk and load statistics.
    async fn statistics(&self) -> Result<AgentStatistics, AgentError>;

    /// Items the agent tracks under `label`.
    async fn list(&self, label: &str) -> Result<Vec<DownloadEntry>, AgentError>;

    /// Submit a metadata structure for download. Returns the hash the agent
    /// computed for it.
    async fn add(
        &self,
        metadata: Vec<u8>,
        file_name: &str,
        label: &str,
    ) -> Result<AddResult, AgentError>;

    /// Completion of specific structural file indices of `hash`.
    async fn file_status(&self, hash: &str, indices: &[i64])
        -> Result<Vec<FileStatus>, AgentError>;

    /// Raw bytes of one structural file.
    async fn download_file(&self, hash: &str, index: i64) -> Result<Vec<u8>, AgentError>;
}

/// Creates clients for persisted agent records.
pub trait AgentConnector: Send + Sync {
    fn connect(&self, agent: &Agent) -> Result<Arc<dyn AgentClient>, AgentError>;
}
