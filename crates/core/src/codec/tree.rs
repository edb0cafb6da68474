//! Folder/file tree view of a structure, for display.

use serde::{Deserialize, Serialize};

use super::{FileEntry, Structure};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchicalFile {
    pub name: String,
    pub length: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchicalFolder {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_folders: Option<Vec<HierarchicalFolder>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<HierarchicalFile>>,
}

impl HierarchicalFolder {
    fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sub_folders: None,
            files: None,
        }
    }

    fn insert(&mut self, path: &[String], length: i64) {
        match path {
            [] => {}
            [name] => self.files.get_or_insert_with(Vec::new).push(HierarchicalFile {
                name: name.clone(),
                length,
            }),
            [folder, rest @ ..] => {
                let sub_folders = self.sub_folders.get_or_insert_with(Vec::new);
                let index = match sub_folders.iter().position(|f| &f.path == folder) {
                    Some(index) => index,
                    None => {
                        sub_folders.push(HierarchicalFolder::new(folder.clone()));
                        sub_folders.len() - 1
                    }
                };
                sub_folders[index].insert(rest, length);
            }
        }
    }

    /// Sort sub-folders by path and files by name, recursively.
    pub fn sort(&mut self) {
        if let Some(sub_folders) = &mut self.sub_folders {
            sub_folders.sort_by(|a, b| a.path.cmp(&b.path));
            for folder in sub_folders.iter_mut() {
                folder.sort();
            }
        }
        if let Some(files) = &mut self.files {
            files.sort_by(|a, b| a.name.cmp(&b.name));
        }
    }

    pub fn build(root: impl Into<String>, files: &[FileEntry]) -> Self {
        let mut tree = HierarchicalFolder::new(root);
        for file in files {
            tree.insert(&file.path, file.length);
        }
        tree
    }
}

impl Structure {
    /// Tree rooted at the structure's name, in structure order.
    pub fn hierarchical_view(&self) -> HierarchicalFolder {
        HierarchicalFolder::build(self.name(), &self.files())
    }
}
