//! Types for the release orchestrator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::{AgentDefaults, AgentError};
use crate::intake::IntakeError;
use crate::release::ReleaseState;
use crate::samples::SamplesConfig;
use crate::store::StoreError;
use crate::upload::{UploadConfig, UploadError};

use super::config::OrchestratorConfig;

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("release not found: {0}")]
    ReleaseNotFound(String),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("source not found: {0}")]
    SourceNotFound(String),

    /// Invalid release state for operation.
    #[error("invalid release state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// The agent is still assigned to a live release.
    #[error("agent {0} is assigned to a live release")]
    AgentInUse(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("intake error: {0}")]
    Intake(#[from] IntakeError),
}

/// Everything configurable the orchestrator reads.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorSettings {
    pub orchestrator: OrchestratorConfig,
    pub agent_defaults: AgentDefaults,
    pub upload: UploadConfig,
    pub samples: SamplesConfig,
    /// Zero disables the age check at intake.
    pub max_age_minutes: u64,
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub running: bool,
    /// Releases in the live working set.
    pub working_set: usize,
    /// Stored releases per state.
    pub releases_by_state: BTreeMap<String, i64>,
    pub agents: usize,
    pub sources: usize,
    pub sample_queue_depth: usize,
    pub sample_queue_capacity: usize,
    /// Downloading releases whose agent has been unreachable too long.
    pub stalled: usize,
}

/// Fields of an agent that can be changed after creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub statistics_interval_secs: Option<u64>,
    #[serde(default)]
    pub list_interval_secs: Option<u64>,
    #[serde(default)]
    pub min_free_disk_space: Option<i64>,
}

impl OrchestratorStatus {
    pub fn count(&self, state: ReleaseState) -> i64 {
        self.releases_by_state
            .get(state.as_str())
            .copied()
            .unwrap_or(0)
    }
}
