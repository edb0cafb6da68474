//! Rewrite, submit, re-announce.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::agent::AgentClient;
use crate::codec::Structure;
use crate::release::{MetaFileKind, MetaFileState, Release};
use crate::store::ArtifactStore;

use super::config::UploadConfig;
use super::destination::{Destination, Submission};
use super::UploadError;

/// Uploads a downloaded release to the destination, then hands the
/// destination-ready copy back to the agent that downloaded it.
///
/// Only the envelope of the structure is rewritten. The content hash of
/// every copy equals the release hash, which is checked before anything
/// leaves the process.
pub struct UploadCoordinator {
    config: UploadConfig,
    destination: Arc<dyn Destination>,
    artifacts: ArtifactStore,
    upload_label: String,
}

impl UploadCoordinator {
    pub fn new(
        config: UploadConfig,
        destination: Arc<dyn Destination>,
        artifacts: ArtifactStore,
        upload_label: impl Into<String>,
    ) -> Self {
        Self {
            config,
            destination,
            artifacts,
            upload_label: upload_label.into(),
        }
    }

    /// Whether a destination endpoint is configured at all.
    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub async fn upload(&self, release: &Release, agent: &dyn AgentClient) -> Result<(), UploadError> {
        if !self.is_configured() {
            return Err(UploadError::NotConfigured);
        }
        let structure_file = release.processed_structure().ok_or_else(|| {
            UploadError::MissingArtifact(format!("no processed structure for {}", release.id))
        })?;
        let nfo_file = release
            .meta_file(MetaFileKind::Nfo)
            .filter(|m| m.state == MetaFileState::Processed)
            .ok_or_else(|| {
                UploadError::MissingArtifact(format!("no processed nfo for {}", release.id))
            })?;

        let raw = self
            .artifacts
            .read(&release.id, &structure_file.file_name)
            .await?;
        let nfo = self.artifacts.read(&release.id, &nfo_file.file_name).await?;

        let mut structure = Structure::decode(&raw)?;
        structure.announce = Some(self.config.tracker_announce_url.clone());
        structure.comment = Some(self.config.comment.clone());
        structure.created_by = Some(self.config.created_by.clone());
        structure.private = Some(1);
        structure.creation_date = Some(Utc::now().timestamp());
        structure.bot = Some(self.config.bot.clone());

        let hash = structure.hash();
        if !hash.eq_ignore_ascii_case(&release.hash) {
            return Err(UploadError::HashChanged {
                expected: release.hash.clone(),
                actual: hash,
            });
        }

        let submission = Submission {
            structure: structure.encode()?,
            nfo,
            files: structure.sorted_files(),
            meta_files: release.meta_files.clone(),
            hash,
            name: release.name.clone(),
            category: release.category,
            category_raw: release.category_raw.clone(),
            published_at: release.published_at,
        };
        self.destination.upload(submission).await?;
        info!("Uploaded {} ({}) to destination", release.name, release.hash);

        structure.announce = Some(self.config.user_announce_url.clone());
        let reannounced = structure.encode()?;
        let result = agent
            .add(
                reannounced,
                &format!("{}.torrent", release.name),
                &self.upload_label,
            )
            .await?;
        if !result.hash.eq_ignore_ascii_case(&release.hash) {
            warn!(
                "Agent reported hash {} for re-announced {}, expected {}",
                result.hash, release.name, release.hash
            );
            return Err(UploadError::HashChanged {
                expected: release.hash.clone(),
                actual: result.hash,
            });
        }

        Ok(())
    }
}
