//! One reconciliation pass over the working set.

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::agent::{allocate, AllocationPolicy};
use crate::events::LifecycleEvent;
use crate::metrics;
use crate::release::{Release, ReleaseState};
use crate::store::{StoreError, ALLOCATION_METHOD_KEY};

use super::runner::Shared;

impl Shared {
    /// Step every live release once. Releases reaching a terminal state
    /// leave the working set.
    pub(super) async fn tick(&self) {
        let policy = self.allocation_policy();

        for handle in self.working_set.handles().await {
            let (id, hash, terminal) = {
                let mut release = handle.lock().await;
                self.step(&mut release, policy).await;
                (
                    release.id.clone(),
                    release.hash.clone(),
                    release.state.is_terminal(),
                )
            };
            if terminal {
                self.working_set.remove(&hash).await;
                self.clear_stalled(&id).await;
            }
        }

        self.update_stalled_gauge().await;
    }

    /// The persisted override if present and valid, else the configured
    /// policy.
    pub(super) fn allocation_policy(&self) -> AllocationPolicy {
        let configured = self.settings.orchestrator.allocation_policy;
        match self.store.get_setting(ALLOCATION_METHOD_KEY) {
            Ok(Some(value)) => value.parse().unwrap_or_else(|e| {
                warn!("Ignoring stored allocation policy: {}", e);
                configured
            }),
            Ok(None) => configured,
            Err(e) => {
                warn!("Failed to read allocation policy setting: {}", e);
                configured
            }
        }
    }

    async fn step(&self, release: &mut Release, policy: AllocationPolicy) {
        match release.state {
            ReleaseState::New => self.step_new(release, policy).await,
            ReleaseState::DownloadInit | ReleaseState::Downloading => {
                self.step_downloading(release).await
            }
            ReleaseState::Downloaded => self.step_downloaded(release).await,
            ReleaseState::Uploaded | ReleaseState::UploadError | ReleaseState::GeneralError => {}
        }
    }

    /// Allocate an agent and submit the structure to it.
    async fn step_new(&self, release: &mut Release, policy: AllocationPolicy) {
        let candidates = self.registry.candidates().await;
        let Some(agent_id) = allocate(policy, &candidates, release.size) else {
            info!(
                "No eligible agent for {} ({} bytes), retrying next tick",
                release.name, release.size
            );
            return;
        };
        let Some(agent) = self.registry.get(&agent_id).await else {
            return;
        };

        if release.agent_id.as_deref() != Some(agent_id.as_str()) {
            if let Err(e) = self.store.assign_agent(&release.id, &agent_id) {
                warn!("Failed to assign agent {} to {}: {}", agent_id, release.id, e);
                return;
            }
            release.agent_id = Some(agent_id.clone());
        }

        let Some(structure) = release.processed_structure().cloned() else {
            error!("Release {} has no processed structure", release.id);
            self.transition(release, ReleaseState::GeneralError).await;
            return;
        };
        let bytes = match self.artifacts.read(&release.id, &structure.file_name).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound(path)) => {
                error!("Structure of release {} is missing at {}", release.id, path);
                self.transition(release, ReleaseState::GeneralError).await;
                return;
            }
            Err(e) => {
                warn!("Failed to read structure of {}: {}", release.id, e);
                return;
            }
        };

        let submit = agent.client();
        let file_name = format!("{}.torrent", release.name);
        let result = tokio::time::timeout(
            self.settings.orchestrator.submit_timeout(),
            submit.add(bytes, &file_name, &self.settings.orchestrator.download_label),
        )
        .await;

        let added = match result {
            Ok(Ok(added)) => added,
            Ok(Err(e)) => {
                warn!("Submitting {} to agent {} failed: {}", release.name, agent_id, e);
                metrics::AGENT_SUBMISSIONS.with_label_values(&["failed"]).inc();
                return;
            }
            Err(_) => {
                warn!("Submitting {} to agent {} timed out", release.name, agent_id);
                metrics::AGENT_SUBMISSIONS.with_label_values(&["failed"]).inc();
                return;
            }
        };

        if !added.hash.eq_ignore_ascii_case(&release.hash) {
            error!(
                "Agent {} reported hash {} for {}, expected {}",
                agent_id, added.hash, release.name, release.hash
            );
            metrics::AGENT_SUBMISSIONS
                .with_label_values(&["hash_mismatch"])
                .inc();
            self.transition(release, ReleaseState::GeneralError).await;
            return;
        }

        metrics::AGENT_SUBMISSIONS.with_label_values(&["accepted"]).inc();
        let record = agent.record_submission().await;
        if let Err(e) = self.store.update_agent(&record) {
            warn!("Failed to persist agent {}: {}", agent_id, e);
        }
        self.transition(release, ReleaseState::DownloadInit).await;
    }

    /// Follow the assigned agent's download list.
    async fn step_downloading(&self, release: &mut Release) {
        let agent = match &release.agent_id {
            Some(agent_id) => self.registry.get(agent_id).await,
            None => None,
        };
        let agent = match agent {
            Some(agent) if agent.is_enabled().await && agent.unreachable_since().await.is_none() => {
                agent
            }
            _ => {
                self.mark_stalled(release).await;
                return;
            }
        };
        self.clear_stalled(&release.id).await;

        let Some(entry) = agent.download(&release.hash).await else {
            debug!("{} not yet listed by agent {}", release.name, agent.id());
            return;
        };

        if release.state == ReleaseState::DownloadInit
            && !self.transition(release, ReleaseState::Downloading).await
        {
            return;
        }

        if entry.is_complete() {
            self.transition(release, ReleaseState::Downloaded).await;
        } else {
            debug!("{} at {:.1}% on agent {}", release.name, entry.done, agent.id());
        }
    }

    /// Upload once every meta file has settled.
    async fn step_downloaded(&self, release: &mut Release) {
        if !release.meta_files_settled() {
            debug!("{} still has unsettled meta files", release.name);
            return;
        }
        if !self.uploader.is_configured() {
            debug!("Uploads not configured, {} stays downloaded", release.name);
            return;
        }
        self.upload(release).await;
    }

    /// Run the upload coordinator and record the outcome. Returns whether
    /// the release ended up uploaded.
    pub(super) async fn upload(&self, release: &mut Release) -> bool {
        let agent = match &release.agent_id {
            Some(agent_id) => self.registry.get(agent_id).await,
            None => None,
        };
        let Some(agent) = agent else {
            error!("Release {} has no registered agent to re-announce to", release.id);
            metrics::UPLOADS.with_label_values(&["failure"]).inc();
            self.transition(release, ReleaseState::UploadError).await;
            return false;
        };

        let started = Instant::now();
        let result = self.uploader.upload(release, agent.client().as_ref()).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(()) => {
                metrics::UPLOADS.with_label_values(&["success"]).inc();
                metrics::UPLOAD_DURATION
                    .with_label_values(&["success"])
                    .observe(elapsed);
                self.transition(release, ReleaseState::Uploaded).await
            }
            Err(e) => {
                error!("Upload of {} failed: {}", release.name, e);
                metrics::UPLOADS.with_label_values(&["failure"]).inc();
                metrics::UPLOAD_DURATION
                    .with_label_values(&["failure"])
                    .observe(elapsed);
                self.transition(release, ReleaseState::UploadError).await;
                false
            }
        }
    }

    /// Persist a state change, then apply it in memory and announce it.
    /// Illegal transitions and failed writes leave the release untouched.
    pub(super) async fn transition(&self, release: &mut Release, to: ReleaseState) -> bool {
        let from = release.state;
        if !from.can_transition_to(to) {
            warn!(
                "Refusing transition of {} from {} to {}",
                release.id, from, to
            );
            return false;
        }

        let uploaded_at = (to == ReleaseState::Uploaded).then(Utc::now);
        if let Err(e) = self.store.update_release_state(&release.id, to, uploaded_at) {
            error!("Failed to persist state {} for {}: {}", to, release.id, e);
            return false;
        }

        release.state = to;
        if uploaded_at.is_some() {
            release.uploaded_at = uploaded_at;
        }

        metrics::RELEASE_TRANSITIONS
            .with_label_values(&[to.as_str()])
            .inc();
        info!("Release {} ({}): {} -> {}", release.name, release.hash, from, to);
        self.events.publish(LifecycleEvent::ReleaseStateChanged {
            release_id: release.id.clone(),
            hash: release.hash.clone(),
            from,
            to,
        });
        true
    }

    /// The assigned agent is disabled, gone, or unreachable. The release
    /// keeps its state.
    async fn mark_stalled(&self, release: &Release) {
        let agent = release.agent_id.as_deref().unwrap_or("<none>");
        if release.state == ReleaseState::Downloading {
            error!(
                "Agent {} of downloading release {} is unavailable",
                agent, release.name
            );
        } else {
            warn!(
                "Agent {} of release {} is unavailable, waiting",
                agent, release.name
            );
        }
        self.stalled_since
            .lock()
            .await
            .entry(release.id.clone())
            .or_insert_with(Utc::now);
    }

    pub(super) async fn clear_stalled(&self, release_id: &str) {
        self.stalled_since.lock().await.remove(release_id);
    }

    /// Releases stalled for longer than the configured threshold.
    pub(super) async fn stalled_count(&self) -> usize {
        let threshold = chrono::Duration::seconds(
            self.settings.orchestrator.stalled_after_secs as i64,
        );
        let now = Utc::now();
        self.stalled_since
            .lock()
            .await
            .values()
            .filter(|since| now - **since >= threshold)
            .count()
    }

    async fn update_stalled_gauge(&self) {
        metrics::RELEASES_STALLED.set(self.stalled_count().await as i64);
    }
}
