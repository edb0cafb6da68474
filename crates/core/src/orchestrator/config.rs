//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::AllocationPolicy;

/// Configuration for the release orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How often every live release is stepped (milliseconds).
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// How often each agent is asked for finished meta files (milliseconds).
    #[serde(default = "default_meta_files_interval")]
    pub meta_files_interval_ms: u64,

    /// Capacity of the intake channel. Producers wait when it is full.
    #[serde(default = "default_intake_buffer")]
    pub intake_buffer: usize,

    /// Capacity of the sample queue. Offers are refused when it is full.
    #[serde(default = "default_sample_queue_capacity")]
    pub sample_queue_capacity: usize,

    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_ms: u64,

    /// Timeout for submitting a structure to an agent (milliseconds).
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_ms: u64,

    /// Agent label for downloads started by the orchestrator.
    #[serde(default = "default_download_label")]
    pub download_label: String,

    /// Agent label for re-announced, destination-ready copies.
    #[serde(default = "default_upload_label")]
    pub upload_label: String,

    /// Used unless the persisted settings override it.
    #[serde(default)]
    pub allocation_policy: AllocationPolicy,

    /// A downloading release counts as stalled once its agent has been
    /// unreachable for this long (seconds).
    #[serde(default = "default_stalled_after")]
    pub stalled_after_secs: u64,
}

fn default_tick_interval() -> u64 {
    5000 // 5 seconds
}

fn default_meta_files_interval() -> u64 {
    20000 // 20 seconds
}

fn default_intake_buffer() -> usize {
    500
}

fn default_sample_queue_capacity() -> usize {
    100
}

fn default_lookup_timeout() -> u64 {
    5000
}

fn default_submit_timeout() -> u64 {
    5000
}

fn default_download_label() -> String {
    "ATUS Download".to_string()
}

fn default_upload_label() -> String {
    "ATUS Upload".to_string()
}

fn default_stalled_after() -> u64 {
    3600
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            meta_files_interval_ms: default_meta_files_interval(),
            intake_buffer: default_intake_buffer(),
            sample_queue_capacity: default_sample_queue_capacity(),
            lookup_timeout_ms: default_lookup_timeout(),
            submit_timeout_ms: default_submit_timeout(),
            download_label: default_download_label(),
            upload_label: default_upload_label(),
            allocation_policy: AllocationPolicy::default(),
            stalled_after_secs: default_stalled_after(),
        }
    }
}

impl OrchestratorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn meta_files_interval(&self) -> Duration {
        Duration::from_millis(self.meta_files_interval_ms)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}
