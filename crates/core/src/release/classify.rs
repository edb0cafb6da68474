//! Turning a discovered metadata structure into a release.

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use crate::codec::{CodecError, Structure};
use crate::samples::SamplesConfig;

use super::types::{
    Category, MetaFile, MetaFileKind, MetaFileState, Release, ReleaseState, NO_INDEX,
};

/// File name of the metadata structure inside a release's data folder.
pub const STRUCTURE_FILE_NAME: &str = "release.torrent";

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("invalid metadata structure: {0}")]
    Codec(#[from] CodecError),

    #[error("metadata structure has no name")]
    EmptyName,

    #[error("release has no nfo file")]
    MissingNfo,
}

/// An image fetched alongside the candidate, e.g. a poster from the feed.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Extension including the dot, e.g. `.jpg`.
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// A freshly classified release plus the artifact bytes it already owns.
#[derive(Debug, Clone)]
pub struct NewRelease {
    pub release: Release,
    /// `(file_name, bytes)` pairs to write into the release's data folder.
    pub artifacts: Vec<(String, Vec<u8>)>,
}

/// Build a release in state `NEW` from raw metadata bytes.
///
/// Meta files are created for the structure itself, the first `.nfo`, every
/// image, the first sample of acceptable size (when enabled), and the
/// source image if one was fetched.
pub fn classify(
    title: &str,
    source_id: Option<&str>,
    metadata: Vec<u8>,
    image: Option<SourceImage>,
    samples: &SamplesConfig,
) -> Result<NewRelease, ClassifyError> {
    let structure = Structure::decode(&metadata)?;

    let name = structure.name().trim().to_string();
    if name.is_empty() {
        return Err(ClassifyError::EmptyName);
    }

    let id = uuid::Uuid::new_v4().to_string();
    let mut meta_files = vec![MetaFile::new(
        &id,
        NO_INDEX,
        MetaFileKind::Torrent,
        MetaFileState::Processed,
        STRUCTURE_FILE_NAME,
    )];
    let mut artifacts = vec![(STRUCTURE_FILE_NAME.to_string(), metadata)];

    let mut has_nfo = false;
    let mut has_sample = false;

    for (index, file) in structure.files().iter().enumerate() {
        let Some(ext) = file.extension() else {
            continue;
        };
        let path = file.joined_path();
        let lower_path = path.to_lowercase();
        let index = index as i64;
        let file_name = format!("{}_{}.{}", index, id, ext);

        let kind = if ext == "nfo" {
            if has_nfo {
                continue;
            }
            has_nfo = true;
            MetaFileKind::Nfo
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            if lower_path.contains("proof") {
                MetaFileKind::ProofImage
            } else if lower_path.contains("screen") {
                MetaFileKind::ScreenImage
            } else {
                MetaFileKind::Image
            }
        } else if samples.enabled
            && !has_sample
            && lower_path.contains("sample")
            && file.length > samples.min_size
            && file.length < samples.max_size
        {
            has_sample = true;
            MetaFileKind::SampleVideo
        } else {
            continue;
        };

        meta_files.push(
            MetaFile::new(&id, index, kind, MetaFileState::Unknown, file_name)
                .with_info("releasePath", path),
        );
    }

    if let Some(image) = image {
        let file_name = format!("source_{}{}", id, image.extension);
        meta_files.push(MetaFile::new(
            &id,
            NO_INDEX,
            MetaFileKind::SourceImage,
            MetaFileState::Processed,
            file_name.clone(),
        ));
        artifacts.push((file_name, image.bytes));
    }

    if !has_nfo {
        return Err(ClassifyError::MissingNfo);
    }

    debug!(
        "Classified {} ({} meta files, {} bytes)",
        name,
        meta_files.len(),
        structure.total_size()
    );

    Ok(NewRelease {
        release: Release {
            id,
            hash: structure.hash(),
            name,
            name_raw: title.to_string(),
            size: structure.total_size(),
            state: ReleaseState::New,
            category: Category::Unknown,
            category_raw: String::new(),
            published_at: None,
            discovered_at: Utc::now(),
            uploaded_at: None,
            source_id: source_id.map(str::to_string),
            agent_id: None,
            meta_files,
        },
        artifacts,
    })
}
