//! Releases, their meta files, and classification of discovered items.

mod classify;
mod types;

pub use classify::{classify, ClassifyError, NewRelease, SourceImage, STRUCTURE_FILE_NAME};
pub use types::{
    Category, MetaFile, MetaFileKind, MetaFileState, Release, ReleaseState, NO_INDEX,
};
