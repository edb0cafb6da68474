//! Release and meta file types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Index of a meta file that has no position in the structure's file list.
pub const NO_INDEX: i64 = -1;

/// Lifecycle state of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseState {
    New,
    DownloadInit,
    Downloading,
    Downloaded,
    Uploaded,
    UploadError,
    GeneralError,
}

impl ReleaseState {
    pub const ALL: [ReleaseState; 7] = [
        ReleaseState::New,
        ReleaseState::DownloadInit,
        ReleaseState::Downloading,
        ReleaseState::Downloaded,
        ReleaseState::Uploaded,
        ReleaseState::UploadError,
        ReleaseState::GeneralError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseState::New => "NEW",
            ReleaseState::DownloadInit => "DOWNLOAD_INIT",
            ReleaseState::Downloading => "DOWNLOADING",
            ReleaseState::Downloaded => "DOWNLOADED",
            ReleaseState::Uploaded => "UPLOADED",
            ReleaseState::UploadError => "UPLOAD_ERROR",
            ReleaseState::GeneralError => "GENERAL_ERROR",
        }
    }

    /// Terminal releases leave the working set.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReleaseState::Uploaded | ReleaseState::UploadError | ReleaseState::GeneralError
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ReleaseState::UploadError | ReleaseState::GeneralError)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// `UploadError -> Uploaded` is only ever requested by a manual upload.
    pub fn can_transition_to(&self, next: ReleaseState) -> bool {
        use ReleaseState::*;
        matches!(
            (self, next),
            (New, DownloadInit)
                | (New, GeneralError)
                | (DownloadInit, Downloading)
                | (Downloading, Downloaded)
                | (Downloaded, Uploaded)
                | (Downloaded, UploadError)
                | (UploadError, Uploaded)
                | (UploadError, UploadError)
        )
    }
}

impl fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReleaseState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown release state: {}", s))
    }
}

/// Content category, as reported by the lookup service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Movie,
    Tv,
    Docu,
    App,
    Game,
    Audio,
    Ebook,
    Xxx,
    #[default]
    Unknown,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Movie,
        Category::Tv,
        Category::Docu,
        Category::App,
        Category::Game,
        Category::Audio,
        Category::Ebook,
        Category::Xxx,
        Category::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Movie => "MOVIE",
            Category::Tv => "TV",
            Category::Docu => "DOCU",
            Category::App => "APP",
            Category::Game => "GAME",
            Category::Audio => "AUDIO",
            Category::Ebook => "EBOOK",
            Category::Xxx => "XXX",
            Category::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == upper)
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

/// What a meta file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetaFileKind {
    Torrent,
    Nfo,
    SourceImage,
    Image,
    ProofImage,
    ScreenImage,
    #[serde(rename = "SCREEN_IMAGE__FROM_SAMPLE")]
    ScreenImageFromSample,
    SampleVideo,
}

impl MetaFileKind {
    pub const ALL: [MetaFileKind; 8] = [
        MetaFileKind::Torrent,
        MetaFileKind::Nfo,
        MetaFileKind::SourceImage,
        MetaFileKind::Image,
        MetaFileKind::ProofImage,
        MetaFileKind::ScreenImage,
        MetaFileKind::ScreenImageFromSample,
        MetaFileKind::SampleVideo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetaFileKind::Torrent => "TORRENT",
            MetaFileKind::Nfo => "NFO",
            MetaFileKind::SourceImage => "SOURCE_IMAGE",
            MetaFileKind::Image => "IMAGE",
            MetaFileKind::ProofImage => "PROOF_IMAGE",
            MetaFileKind::ScreenImage => "SCREEN_IMAGE",
            MetaFileKind::ScreenImageFromSample => "SCREEN_IMAGE__FROM_SAMPLE",
            MetaFileKind::SampleVideo => "SAMPLE_VIDEO",
        }
    }
}

impl FromStr for MetaFileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetaFileKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown meta file kind: {}", s))
    }
}

/// Progress of a meta file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetaFileState {
    /// Not fetched from the agent yet.
    Unknown,
    /// Fetched, waiting for post-processing.
    Downloaded,
    /// Ready to be uploaded.
    Processed,
    Error,
}

impl MetaFileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetaFileState::Unknown => "UNKNOWN",
            MetaFileState::Downloaded => "DOWNLOADED",
            MetaFileState::Processed => "PROCESSED",
            MetaFileState::Error => "ERROR",
        }
    }
}

impl FromStr for MetaFileState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNKNOWN" => Ok(MetaFileState::Unknown),
            "DOWNLOADED" => Ok(MetaFileState::Downloaded),
            "PROCESSED" => Ok(MetaFileState::Processed),
            "ERROR" => Ok(MetaFileState::Error),
            other => Err(format!("unknown meta file state: {}", other)),
        }
    }
}

/// An auxiliary artifact of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaFile {
    pub id: String,
    pub release_id: String,
    /// Position in the structure's file list, or [`NO_INDEX`].
    pub index: i64,
    pub kind: MetaFileKind,
    pub state: MetaFileState,
    /// Name of the artifact inside the release's data folder.
    pub file_name: String,
    #[serde(default)]
    pub info: BTreeMap<String, String>,
}

impl MetaFile {
    pub fn new(
        release_id: impl Into<String>,
        index: i64,
        kind: MetaFileKind,
        state: MetaFileState,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            release_id: release_id.into(),
            index,
            kind,
            state,
            file_name: file_name.into(),
            info: BTreeMap::new(),
        }
    }

    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }

    /// Processed or failed: nothing more will happen to it.
    pub fn is_settled(&self) -> bool {
        matches!(self.state, MetaFileState::Processed | MetaFileState::Error)
    }

    /// Still has to be fetched from the assigned agent.
    pub fn awaits_download(&self) -> bool {
        self.state == MetaFileState::Unknown && self.index != NO_INDEX
    }
}

/// The unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    /// Content hash of the metadata structure. Never changes.
    pub hash: String,
    pub name: String,
    /// Title as announced by the source.
    pub name_raw: String,
    pub size: i64,
    pub state: ReleaseState,
    pub category: Category,
    pub category_raw: String,
    /// Publication time reported by the lookup service.
    pub published_at: Option<DateTime<Utc>>,
    pub discovered_at: DateTime<Utc>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub source_id: Option<String>,
    pub agent_id: Option<String>,
    pub meta_files: Vec<MetaFile>,
}

impl Release {
    /// The single processed metadata structure artifact, if any.
    pub fn processed_structure(&self) -> Option<&MetaFile> {
        let mut found = self
            .meta_files
            .iter()
            .filter(|m| m.kind == MetaFileKind::Torrent && m.state == MetaFileState::Processed);
        match (found.next(), found.next()) {
            (Some(meta), None) => Some(meta),
            _ => None,
        }
    }

    pub fn meta_file(&self, kind: MetaFileKind) -> Option<&MetaFile> {
        self.meta_files.iter().find(|m| m.kind == kind)
    }

    pub fn meta_files_settled(&self) -> bool {
        self.meta_files.iter().all(MetaFile::is_settled)
    }
}
