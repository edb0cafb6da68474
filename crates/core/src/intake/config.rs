//! Intake filter configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Accept/reject rules applied to newly discovered releases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FiltersConfig {
    /// Drop releases published longer ago than this. Zero disables the check.
    #[serde(default)]
    pub max_age_minutes: u64,

    /// Per-category rules keyed by category name (case-insensitive).
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryFilterConfig>,
}

/// Rules for one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryFilterConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Terms that accept a release outright when found in its name.
    #[serde(default)]
    pub includes: Vec<String>,

    /// Terms that reject a release when found in its name.
    #[serde(default)]
    pub excludes: Vec<String>,

    /// Maximum size in bytes. Zero disables the check.
    #[serde(default)]
    pub max_size: i64,
}

fn default_enabled() -> bool {
    true
}

impl Default for CategoryFilterConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            includes: Vec::new(),
            excludes: Vec::new(),
            max_size: 0,
        }
    }
}

/// A discovery source declared in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSeed {
    pub name: String,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_source_interval")]
    pub interval_secs: u64,
}

fn default_source_interval() -> u64 {
    300
}
