//! Discovery and intake types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::release::{Category, ClassifyError};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("intake channel closed")]
    ChannelClosed,
}

/// A discovery source, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub interval_secs: u64,
    pub last_check: Option<DateTime<Utc>>,
    pub times_checked: i64,
    pub releases_found: i64,
    pub created_at: DateTime<Utc>,
}

/// An item announced by a source, before anything was fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub title: String,
    pub metadata_url: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// What the lookup service knows about a release name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LookupResult {
    pub published_at: Option<DateTime<Utc>>,
    pub category: Category,
    /// Category string as reported, before normalization.
    pub category_raw: String,
}

/// Outcome of an accept policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject(String),
}

impl Decision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept)
    }
}
