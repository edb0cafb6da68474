//! Destination upload configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where finished releases go and how their structure is rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Destination upload endpoint. Empty disables uploads.
    #[serde(default)]
    pub api_url: String,

    /// Token sent as the `authentication` query parameter.
    #[serde(default)]
    pub auth_token: String,

    /// Announce URL written into the structure sent to the destination.
    #[serde(default)]
    pub tracker_announce_url: String,

    /// Announce URL of the re-announced copy handed back to the agent.
    #[serde(default)]
    pub user_announce_url: String,

    #[serde(default = "default_user_id")]
    pub user_id: String,

    #[serde(default)]
    pub comment: String,

    #[serde(default = "default_created_by")]
    pub created_by: String,

    #[serde(default)]
    pub bot: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_user_id() -> String {
    "0".to_string()
}

fn default_created_by() -> String {
    "ATUS".to_string()
}

fn default_timeout() -> u64 {
    15
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            auth_token: String::new(),
            tracker_announce_url: String::new(),
            user_announce_url: String::new(),
            user_id: default_user_id(),
            comment: String::new(),
            created_by: default_created_by(),
            bot: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

impl UploadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_configured(&self) -> bool {
        !self.api_url.is_empty()
    }
}
