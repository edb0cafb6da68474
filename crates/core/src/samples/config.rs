//! Sample handling configuration.

use serde::{Deserialize, Serialize};

const MIB: i64 = 1024 * 1024;

/// Which sample videos are picked up at classification time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplesConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Exclusive lower bound in bytes.
    #[serde(default = "default_min_size")]
    pub min_size: i64,

    /// Exclusive upper bound in bytes.
    #[serde(default = "default_max_size")]
    pub max_size: i64,
}

fn default_enabled() -> bool {
    true
}

fn default_min_size() -> i64 {
    2 * MIB
}

fn default_max_size() -> i64 {
    200 * MIB
}

impl Default for SamplesConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            min_size: default_min_size(),
            max_size: default_max_size(),
        }
    }
}
