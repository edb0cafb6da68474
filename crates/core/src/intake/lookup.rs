//! Release name lookup: publication time and category.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::release::Category;

use super::types::{IntakeError, LookupResult};

/// Collaborator that knows when a release was published and what it is.
#[async_trait]
pub trait ReleaseLookup: Send + Sync {
    async fn lookup(&self, name: &str) -> Result<LookupResult, IntakeError>;
}

/// Lookup that knows nothing: every release is uncategorized.
pub struct NoLookup;

#[async_trait]
impl ReleaseLookup for NoLookup {
    async fn lookup(&self, _name: &str) -> Result<LookupResult, IntakeError> {
        Ok(LookupResult::default())
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<LookupData>,
}

#[derive(Debug, Deserialize)]
struct LookupData {
    #[serde(default)]
    rows: Vec<LookupRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupRow {
    name: String,
    #[serde(default)]
    cat: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    pre_at: Option<i64>,
}

/// Lookup against a pre-database style JSON API:
/// `GET <url>?q="<name>"` answering
/// `{"status": "success", "data": {"rows": [{"name", "cat", "url", "preAt"}]}}`.
pub struct HttpLookup {
    client: Client,
    base_url: Url,
}

impl HttpLookup {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, IntakeError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| IntakeError::Lookup(format!("invalid lookup URL {}: {}", base_url, e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IntakeError::Lookup(e.to_string()))?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl ReleaseLookup for HttpLookup {
    async fn lookup(&self, name: &str) -> Result<LookupResult, IntakeError> {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("q", &format!("\"{}\"", name));
        debug!("Lookup request: GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IntakeError::Lookup(e.to_string()))?;
        if !response.status().is_success() {
            return Err(IntakeError::Lookup(format!("HTTP {}", response.status())));
        }
        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| IntakeError::Lookup(e.to_string()))?;

        if body.status != "success" {
            return Err(IntakeError::Lookup(body.message));
        }

        let wanted = comparable(name);
        let row = body
            .data
            .map(|d| d.rows)
            .unwrap_or_default()
            .into_iter()
            .find(|row| {
                let candidate = comparable(&row.name);
                !candidate.is_empty() && candidate == wanted
            })
            .ok_or_else(|| IntakeError::Lookup(format!("no entry for {}", name)))?;

        Ok(LookupResult {
            published_at: row
                .pre_at
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            category: normalize_category(&row.cat, row.url.as_deref().unwrap_or("")),
            category_raw: row.cat,
        })
    }
}

/// Lowercase alphanumerics only, for comparing release names.
fn comparable(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

const CATEGORY_ALIASES: &[(Category, &[&str])] = &[
    (Category::Xxx, &["xxx"]),
    (Category::Tv, &["tv", "serie"]),
    (
        Category::Movie,
        &["movie", "screener", "vcd", "dvdr", "mvid", "divx", "xvid", "anime", "video"],
    ),
    (Category::Audio, &["flac", "mp3", "music", "audio", "soundtrack"]),
    (Category::Ebook, &["book"]),
    (
        Category::App,
        &["app", "software", "0day", "0-day", "pda", "mac", "symbian", "iphone"],
    ),
    (Category::Docu, &["docu", "doku"]),
    (
        Category::Game,
        &[
            "console", "game", "psx", "ps1", "ps2", "ps3", "ps4", "ps5", "xbox", "dox", "nds",
            "gba", "ngc", "dreamcast", "gbc", "3ds",
        ],
    ),
];

/// Map the lookup service's free-form category (and reference URL) onto a
/// [`Category`].
pub fn normalize_category(raw: &str, url: &str) -> Category {
    let category = raw.to_lowercase();
    let url = url.to_lowercase();

    if url.contains("soundcloud.com/") || url.contains("discogs.com/") {
        return Category::Audio;
    }
    if ["tvmaze.com/shows/", "tvland.com/", "tvrage.com/", "thetvdb.com/"]
        .iter()
        .any(|host| url.contains(host))
    {
        return Category::Tv;
    }

    for (target, aliases) in CATEGORY_ALIASES {
        if aliases.iter().any(|alias| category.contains(alias)) {
            return *target;
        }
    }

    if url.contains("imdb.com/") || category.contains("bluray") {
        return Category::Movie;
    }

    Category::Unknown
}
