//! Artifact bytes on disk, one folder per release.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::StoreError;

/// Files under `<root>/<release_id>/<file_name>`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn release_dir(&self, release_id: &str) -> PathBuf {
        self.root.join(release_id)
    }

    pub fn path(&self, release_id: &str, file_name: &str) -> PathBuf {
        self.release_dir(release_id).join(file_name)
    }

    pub async fn write(
        &self,
        release_id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StoreError> {
        check_file_name(file_name)?;
        let dir = self.release_dir(release_id);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;
        debug!("Wrote artifact {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    pub async fn read(&self, release_id: &str, file_name: &str) -> Result<Vec<u8>, StoreError> {
        check_file_name(file_name)?;
        let path = self.path(release_id, file_name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, release_id: &str, file_name: &str) -> bool {
        tokio::fs::try_exists(self.path(release_id, file_name))
            .await
            .unwrap_or(false)
    }

    /// Remove the release's folder. A missing folder is not an error.
    pub async fn remove_release(&self, release_id: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_dir_all(self.release_dir(release_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn check_file_name(file_name: &str) -> Result<(), StoreError> {
    if file_name.is_empty()
        || file_name.contains('/')
        || file_name.contains('\\')
        || file_name == "."
        || file_name == ".."
    {
        return Err(StoreError::Conflict(format!(
            "invalid artifact file name: {:?}",
            file_name
        )));
    }
    Ok(())
}
