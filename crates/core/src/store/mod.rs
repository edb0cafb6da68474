//! Durable state.
//!
//! The database is the source of truth across restarts: every state change
//! is written here before the in-memory view treats it as authoritative.
//! Artifact bytes live on disk next to it, see [`ArtifactStore`].

mod artifacts;
mod sqlite;

pub use artifacts::ArtifactStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::agent::Agent;
use crate::intake::SourceRecord;
use crate::release::{MetaFile, Release, ReleaseState};

/// Settings key overriding the configured allocation policy.
pub const ALLOCATION_METHOD_KEY: &str = "fileserver.allocation_method";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Filter for querying releases.
#[derive(Debug, Clone, Default)]
pub struct ReleaseFilter {
    /// Any of these states. Empty matches all.
    pub states: Vec<ReleaseState>,
    pub agent_id: Option<String>,
    /// Maximum number of results. Zero means no limit.
    pub limit: i64,
}

impl ReleaseFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_states(mut self, states: &[ReleaseState]) -> Self {
        self.states = states.to_vec();
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Every state that is not terminal.
    pub fn live() -> Self {
        let states: Vec<_> = ReleaseState::ALL
            .into_iter()
            .filter(|s| !s.is_terminal())
            .collect();
        Self::new().with_states(&states)
    }
}

/// Storage backend for releases, meta files, agents, sources and settings.
pub trait Store: Send + Sync {
    /// Insert a release with its meta files. Fails with
    /// [`StoreError::Conflict`] if the hash is already stored.
    fn insert_release(&self, release: &Release) -> Result<(), StoreError>;

    /// A release with its meta files.
    fn get_release(&self, id: &str) -> Result<Option<Release>, StoreError>;

    fn find_release_by_hash(&self, hash: &str) -> Result<Option<Release>, StoreError>;

    /// Whether a release with this hash or this name is stored.
    fn release_exists(&self, hash: &str, name: &str) -> Result<bool, StoreError>;

    fn list_releases(&self, filter: &ReleaseFilter) -> Result<Vec<Release>, StoreError>;

    fn count_releases_by_state(&self) -> Result<Vec<(ReleaseState, i64)>, StoreError>;

    fn update_release_state(
        &self,
        id: &str,
        state: ReleaseState,
        uploaded_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    fn assign_agent(&self, id: &str, agent_id: &str) -> Result<(), StoreError>;

    /// Delete a release and its meta files. Returns what was deleted.
    fn delete_release(&self, id: &str) -> Result<Release, StoreError>;

    /// Insert or replace one meta file.
    fn save_meta_file(&self, meta_file: &MetaFile) -> Result<(), StoreError>;

    fn insert_agent(&self, agent: &Agent) -> Result<(), StoreError>;
    fn update_agent(&self, agent: &Agent) -> Result<(), StoreError>;
    fn get_agent(&self, id: &str) -> Result<Option<Agent>, StoreError>;
    fn find_agent_by_name(&self, name: &str) -> Result<Option<Agent>, StoreError>;
    fn list_agents(&self) -> Result<Vec<Agent>, StoreError>;
    fn delete_agent(&self, id: &str) -> Result<(), StoreError>;

    fn insert_source(&self, source: &SourceRecord) -> Result<(), StoreError>;
    fn update_source(&self, source: &SourceRecord) -> Result<(), StoreError>;
    fn get_source(&self, id: &str) -> Result<Option<SourceRecord>, StoreError>;
    fn find_source_by_name(&self, name: &str) -> Result<Option<SourceRecord>, StoreError>;
    fn list_sources(&self) -> Result<Vec<SourceRecord>, StoreError>;
    fn delete_source(&self, id: &str) -> Result<(), StoreError>;
    /// Add one to a source's found-releases counter.
    fn increment_source_releases(&self, id: &str) -> Result<(), StoreError>;

    fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
