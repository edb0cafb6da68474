//! Fetching finished meta files from an agent.

use tracing::{debug, error, warn};

use crate::agent::{AgentClient, LiveAgent};
use crate::events::LifecycleEvent;
use crate::metrics;
use crate::release::{MetaFile, MetaFileKind, MetaFileState, ReleaseState};
use crate::samples::{Offer, SampleJob};
use crate::store::StoreError;

use super::runner::Shared;

/// Release states whose meta files are still being collected.
const POLLED_STATES: [ReleaseState; 3] = [
    ReleaseState::DownloadInit,
    ReleaseState::Downloading,
    ReleaseState::Downloaded,
];

impl Shared {
    /// Ask `agent` which awaited meta files of its releases are complete and
    /// fetch those. Downloaded samples are (re)offered to the sample queue.
    pub(super) async fn poll_meta_files(&self, agent: &LiveAgent) {
        if !agent.is_enabled().await {
            return;
        }
        let client = agent.client();

        for handle in self.working_set.handles().await {
            let (release_id, hash, awaiting, samples) = {
                let release = handle.lock().await;
                if release.agent_id.as_deref() != Some(agent.id())
                    || !POLLED_STATES.contains(&release.state)
                {
                    continue;
                }
                let awaiting: Vec<MetaFile> = release
                    .meta_files
                    .iter()
                    .filter(|m| m.awaits_download())
                    .cloned()
                    .collect();
                let samples: Vec<String> = release
                    .meta_files
                    .iter()
                    .filter(|m| {
                        m.kind == MetaFileKind::SampleVideo && m.state == MetaFileState::Downloaded
                    })
                    .map(|m| m.id.clone())
                    .collect();
                (release.id.clone(), release.hash.clone(), awaiting, samples)
            };

            for meta_file_id in samples {
                self.offer_sample(&release_id, &hash, meta_file_id);
            }
            if awaiting.is_empty() {
                continue;
            }

            let indices: Vec<i64> = awaiting.iter().map(|m| m.index).collect();
            let statuses = match client.file_status(&hash, &indices).await {
                Ok(statuses) => statuses,
                Err(e) => {
                    warn!(
                        "File status of {} on agent {} failed: {}",
                        release_id,
                        agent.id(),
                        e
                    );
                    continue;
                }
            };

            let mut changed = false;
            for status in statuses.into_iter().filter(|s| s.completed) {
                let Some(meta_file) = awaiting.iter().find(|m| m.index == status.index) else {
                    continue;
                };
                if self
                    .fetch_meta_file(client.as_ref(), &hash, meta_file.clone())
                    .await
                {
                    changed = true;
                }
            }

            if changed {
                let meta_files = handle.lock().await.meta_files.clone();
                self.events.publish(LifecycleEvent::MetaFilesUpdated {
                    release_id,
                    meta_files,
                });
            }
        }
    }

    /// Download one meta file, store it, and persist its new state before
    /// updating the working set.
    async fn fetch_meta_file(
        &self,
        client: &dyn AgentClient,
        hash: &str,
        mut meta_file: MetaFile,
    ) -> bool {
        let bytes = match client.download_file(hash, meta_file.index).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    "Downloading file {} of {} failed: {}",
                    meta_file.index, meta_file.release_id, e
                );
                return false;
            }
        };

        // Deleted while the file was downloading.
        if !self.working_set.contains(hash).await {
            debug!(
                "Release {} left the working set, dropping file",
                meta_file.release_id
            );
            return false;
        }
        if let Err(e) = self
            .artifacts
            .write(&meta_file.release_id, &meta_file.file_name, &bytes)
            .await
        {
            error!("Failed to store {}: {}", meta_file.file_name, e);
            return false;
        }

        meta_file.state = if meta_file.kind == MetaFileKind::SampleVideo {
            MetaFileState::Downloaded
        } else {
            MetaFileState::Processed
        };
        match self.store.save_meta_file(&meta_file) {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                warn!(
                    "Release {} was deleted, dropping {}",
                    meta_file.release_id, meta_file.file_name
                );
                if let Err(e) = self.artifacts.remove_release(&meta_file.release_id).await {
                    warn!("Failed to remove artifacts of {}: {}", meta_file.release_id, e);
                }
                return false;
            }
            Err(e) => {
                error!("Failed to persist meta file {}: {}", meta_file.id, e);
                return false;
            }
        }
        self.working_set.update_meta_file(hash, &meta_file).await;
        debug!(
            "Fetched {} ({}) of release {}",
            meta_file.file_name,
            meta_file.kind.as_str(),
            meta_file.release_id
        );

        if meta_file.kind == MetaFileKind::SampleVideo {
            self.offer_sample(&meta_file.release_id, hash, meta_file.id.clone());
        }
        true
    }

    /// Offer a downloaded sample without waiting. A full queue leaves the
    /// sample downloaded for the next poll.
    pub(super) fn offer_sample(&self, release_id: &str, hash: &str, meta_file_id: String) {
        let job = SampleJob {
            release_id: release_id.to_string(),
            hash: hash.to_string(),
            meta_file_id,
        };
        match self.sample_queue.offer(job) {
            Offer::Queued => debug!("Queued sample of release {}", release_id),
            Offer::AlreadyPending => {}
            Offer::Full => {
                error!(
                    "Sample queue full ({} jobs), release {} waits for the next poll",
                    self.sample_queue.capacity(),
                    release_id
                );
                metrics::SAMPLE_QUEUE_REJECTIONS.inc();
                self.events.publish(LifecycleEvent::SampleQueueFull {
                    release_id: release_id.to_string(),
                    capacity: self.sample_queue.capacity(),
                });
            }
            Offer::Closed => warn!("Sample queue closed, dropping sample of {}", release_id),
        }
    }
}
