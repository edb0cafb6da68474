//! The live set of non-terminal releases.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::metrics;
use crate::release::{MetaFile, Release};

/// A release held in the working set. Lock it to read or mutate.
pub type TrackedRelease = Arc<Mutex<Release>>;

/// Non-terminal releases keyed by lowercase content hash.
///
/// Iteration works on a snapshot of the handles, so inserts and removals
/// from other tasks never invalidate an ongoing scan.
#[derive(Default)]
pub struct WorkingSet {
    releases: RwLock<HashMap<String, TrackedRelease>>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless a release with the same hash is already tracked.
    /// Returns whether it was inserted.
    pub async fn insert(&self, release: Release) -> bool {
        let key = release.hash.to_ascii_lowercase();
        let mut releases = self.releases.write().await;
        if releases.contains_key(&key) {
            return false;
        }
        releases.insert(key, Arc::new(Mutex::new(release)));
        metrics::WORKING_SET_SIZE.set(releases.len() as i64);
        true
    }

    pub async fn get(&self, hash: &str) -> Option<TrackedRelease> {
        self.releases
            .read()
            .await
            .get(&hash.to_ascii_lowercase())
            .cloned()
    }

    pub async fn contains(&self, hash: &str) -> bool {
        self.releases
            .read()
            .await
            .contains_key(&hash.to_ascii_lowercase())
    }

    /// Look a release up by id. Linear in the size of the set.
    pub async fn find_by_id(&self, id: &str) -> Option<TrackedRelease> {
        for tracked in self.handles().await {
            if tracked.lock().await.id == id {
                return Some(tracked);
            }
        }
        None
    }

    pub async fn remove(&self, hash: &str) -> Option<TrackedRelease> {
        let mut releases = self.releases.write().await;
        let removed = releases.remove(&hash.to_ascii_lowercase());
        metrics::WORKING_SET_SIZE.set(releases.len() as i64);
        removed
    }

    pub async fn len(&self) -> usize {
        self.releases.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.releases.read().await.is_empty()
    }

    /// Handles to every tracked release at this instant.
    pub async fn handles(&self) -> Vec<TrackedRelease> {
        self.releases.read().await.values().cloned().collect()
    }

    /// Copies of every tracked release, ordered by discovery time.
    pub async fn snapshot(&self) -> Vec<Release> {
        let mut releases = Vec::new();
        for tracked in self.handles().await {
            releases.push(tracked.lock().await.clone());
        }
        releases.sort_by(|a, b| a.discovered_at.cmp(&b.discovered_at));
        releases
    }

    /// Replace a meta file of a tracked release by id. Returns false when
    /// the release or the meta file is not tracked.
    pub async fn update_meta_file(&self, hash: &str, meta_file: &MetaFile) -> bool {
        let Some(tracked) = self.get(hash).await else {
            return false;
        };
        let mut release = tracked.lock().await;
        match release.meta_files.iter_mut().find(|m| m.id == meta_file.id) {
            Some(existing) => {
                *existing = meta_file.clone();
                true
            }
            None => false,
        }
    }

    /// Append a meta file to a tracked release.
    pub async fn add_meta_file(&self, hash: &str, meta_file: MetaFile) -> bool {
        let Some(tracked) = self.get(hash).await else {
            return false;
        };
        tracked.lock().await.meta_files.push(meta_file);
        true
    }
}
