//! Flat file listing of a structure.

use serde::{Deserialize, Serialize};

use super::Structure;

/// One file of a structure, path split into its components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: Vec<String>,
    pub length: i64,
}

impl FileEntry {
    pub fn joined_path(&self) -> String {
        self.path.join("/")
    }

    /// Lowercase extension of the last path component, without the dot.
    pub fn extension(&self) -> Option<String> {
        let file_name = self.path.last()?;
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }
}

/// Stable sort by joined path.
pub fn sort_files(files: &mut [FileEntry]) {
    files.sort_by_cached_key(FileEntry::joined_path);
}

impl Structure {
    /// Files in structure order. A single-file structure yields one entry
    /// named after the structure.
    pub fn files(&self) -> Vec<FileEntry> {
        let info = self.info();
        match &info.files {
            Some(files) => files.clone(),
            None => vec![FileEntry {
                path: vec![info.name.clone()],
                length: info.length.unwrap_or(0),
            }],
        }
    }

    pub fn sorted_files(&self) -> Vec<FileEntry> {
        let mut files = self.files();
        sort_files(&mut files);
        files
    }

    /// Total payload size in bytes.
    pub fn total_size(&self) -> i64 {
        let info = self.info();
        match (&info.files, info.length) {
            (Some(files), _) => files.iter().map(|f| f.length).sum(),
            (None, Some(length)) => length,
            (None, None) => 0,
        }
    }
}
