//! Agent records and wire types of the agent protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors talking to a remote agent.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Agent returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Agent not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Whether retrying on a later tick may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AgentError::ConnectionFailed(_) | AgentError::Timeout | AgentError::Api { .. }
        )
    }
}

/// A registered download agent, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub statistics_interval_secs: u64,
    pub list_interval_secs: u64,
    /// Free space (bytes) the agent must keep after accepting a release.
    pub min_free_disk_space: i64,
    /// Structures successfully submitted for download.
    pub files_submitted: i64,
    /// Last successful statistics poll.
    pub last_statistics_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Disk and load statistics reported by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatistics {
    #[serde(default)]
    pub server_load: Vec<f64>,
    pub disk_total_space: i64,
    pub disk_free_space: i64,
}

/// State of an item in an agent's download list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownloadState {
    #[serde(alias = "started")]
    Started,
    #[serde(alias = "paused")]
    Paused,
    #[serde(alias = "stopped")]
    Stopped,
    #[serde(alias = "hashing")]
    Hashing,
    #[serde(alias = "checking")]
    Checking,
    #[serde(alias = "error")]
    Error,
}

/// One entry of an agent's download list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadEntry {
    pub hash: String,
    pub state: DownloadState,
    /// Bytes per second.
    #[serde(default)]
    pub download_rate: i64,
    /// Completion in percent (0-100).
    #[serde(default)]
    pub done: f64,
    /// Seconds until completion.
    #[serde(default)]
    pub eta: i64,
}

impl DownloadEntry {
    pub fn is_complete(&self) -> bool {
        self.done >= 100.0
    }
}

/// Completion of one structural file index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatus {
    #[serde(rename = "Index", alias = "index")]
    pub index: i64,
    #[serde(rename = "Completed", alias = "completed")]
    pub completed: bool,
}

/// Response of the `add` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddResult {
    /// Content hash computed by the agent.
    #[serde(rename = "Hash", alias = "hash")]
    pub hash: String,
}

/// Point-in-time view of an agent for the API and status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSnapshot {
    #[serde(flatten)]
    pub agent: Agent,
    pub statistics: Option<AgentStatistics>,
    pub last_contact: Option<DateTime<Utc>>,
    pub tracked_downloads: usize,
}
