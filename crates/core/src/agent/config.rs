//! Agent configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const GIB: i64 = 1024 * 1024 * 1024;

/// Defaults applied to every agent unless overridden per agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaults {
    /// How often disk/load statistics are polled (seconds).
    #[serde(default = "default_statistics_interval")]
    pub statistics_interval_secs: u64,

    /// How often the download list is polled (seconds).
    #[serde(default = "default_list_interval")]
    pub list_interval_secs: u64,

    /// Minimum free disk space (bytes) an agent must keep.
    #[serde(default = "default_min_free_disk_space")]
    pub min_free_disk_space: i64,

    /// Timeout for statistics, list, add and file status calls (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for file downloads (seconds).
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Accept self-signed certificates on agent endpoints.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_statistics_interval() -> u64 {
    10
}

fn default_list_interval() -> u64 {
    5
}

fn default_min_free_disk_space() -> i64 {
    25 * GIB
}

fn default_request_timeout() -> u64 {
    10
}

fn default_download_timeout() -> u64 {
    15
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            statistics_interval_secs: default_statistics_interval(),
            list_interval_secs: default_list_interval(),
            min_free_disk_space: default_min_free_disk_space(),
            request_timeout_secs: default_request_timeout(),
            download_timeout_secs: default_download_timeout(),
            accept_invalid_certs: false,
        }
    }
}

impl AgentDefaults {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// An agent declared in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSeed {
    pub name: String,
    pub url: String,
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub statistics_interval_secs: Option<u64>,
    #[serde(default)]
    pub list_interval_secs: Option<u64>,
    #[serde(default)]
    pub min_free_disk_space: Option<i64>,
}

fn default_seed_enabled() -> bool {
    true
}
