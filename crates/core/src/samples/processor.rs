//! Post-processing of downloaded sample videos.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::release::{MetaFile, Release};

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("processing failed: {0}")]
    Processing(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A still image taken from a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    /// Extension including the dot, e.g. `.jpg`.
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// What processing produced for one sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleOutcome {
    /// Merged into the sample meta file's info.
    pub info: BTreeMap<String, String>,
    pub screenshots: Vec<Screenshot>,
}

/// Collaborator turning a downloaded sample into a destination-ready one.
#[async_trait]
pub trait SampleProcessor: Send + Sync {
    async fn process(
        &self,
        release: &Release,
        sample: &MetaFile,
        path: &Path,
    ) -> Result<SampleOutcome, SampleError>;
}

/// Accepts every sample as-is, recording its size on disk.
pub struct PassthroughSampleProcessor;

#[async_trait]
impl SampleProcessor for PassthroughSampleProcessor {
    async fn process(
        &self,
        _release: &Release,
        _sample: &MetaFile,
        path: &Path,
    ) -> Result<SampleOutcome, SampleError> {
        let metadata = tokio::fs::metadata(path).await?;
        let mut info = BTreeMap::new();
        info.insert("size".to_string(), metadata.len().to_string());
        Ok(SampleOutcome {
            info,
            screenshots: Vec::new(),
        })
    }
}
