//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of all external collaborator
//! traits, allowing comprehensive E2E testing without real agents, sources
//! or destinations.
//!
//! # Example
//!
//! ```rust,ignore
//! use atus_core::testing::{fixtures, MockConnector, MockDestination};
//!
//! let connector = MockConnector::new();
//! let destination = MockDestination::new();
//!
//! // Configure mock behavior
//! connector.client("agent-1").set_download("abcd", DownloadState::Started, 100.0).await;
//! destination.set_next_error(UploadError::Rejected("dupe".into()));
//!
//! // Use in OrchestratorParts...
//! ```

mod mock_agent;
mod mock_destination;
mod mock_intake;
mod mock_samples;

pub use mock_agent::{DownloadGate, MockAgentClient, MockConnector, RecordedAdd};
pub use mock_destination::MockDestination;
pub use mock_intake::{MockLookup, MockSource, MockSourceConnector};
pub use mock_samples::{MockSampleProcessor, RecordingSubscriber};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::agent::{Agent, AgentStatistics};
    use crate::codec::{FileEntry, Info, Structure};
    use crate::intake::SourceRecord;
    use crate::release::{
        Category, MetaFile, MetaFileKind, MetaFileState, Release, ReleaseState, NO_INDEX,
        STRUCTURE_FILE_NAME,
    };

    const PIECE_LENGTH: i64 = 16 * 1024;

    fn pieces_for(total: i64) -> Vec<u8> {
        let count = ((total + PIECE_LENGTH - 1) / PIECE_LENGTH).max(1) as usize;
        vec![0xab; count * 20]
    }

    /// Encoded multi-file structure named `name` with `(path, length)`
    /// entries. Paths use `/` between components.
    pub fn structure_bytes(name: &str, files: &[(&str, i64)]) -> Vec<u8> {
        let entries: Vec<FileEntry> = files
            .iter()
            .map(|(path, length)| FileEntry {
                path: path.split('/').map(str::to_string).collect(),
                length: *length,
            })
            .collect();
        let total = files.iter().map(|(_, length)| length).sum();

        let info = Info {
            name: name.to_string(),
            piece_length: PIECE_LENGTH,
            pieces: pieces_for(total),
            length: None,
            files: Some(entries),
        };
        encode(info)
    }

    /// Encoded single-file structure.
    pub fn single_file_bytes(name: &str, length: i64) -> Vec<u8> {
        let info = Info {
            name: name.to_string(),
            piece_length: PIECE_LENGTH,
            pieces: pieces_for(length),
            length: Some(length),
            files: None,
        };
        encode(info)
    }

    fn encode(info: Info) -> Vec<u8> {
        match Structure::from_info(info).and_then(|s| s.encode()) {
            Ok(bytes) => bytes,
            Err(e) => panic!("fixture structure failed to encode: {}", e),
        }
    }

    /// A NEW release with a processed structure and an awaited nfo at
    /// index 0. Not backed by artifacts on disk.
    pub fn release(name: &str, hash: &str) -> Release {
        let id = uuid::Uuid::new_v4().to_string();
        let meta_files = vec![
            MetaFile::new(
                &id,
                NO_INDEX,
                MetaFileKind::Torrent,
                MetaFileState::Processed,
                STRUCTURE_FILE_NAME,
            ),
            MetaFile::new(
                &id,
                0,
                MetaFileKind::Nfo,
                MetaFileState::Unknown,
                format!("0_{}.nfo", id),
            ),
        ];
        Release {
            id,
            hash: hash.to_lowercase(),
            name: name.to_string(),
            name_raw: name.to_string(),
            size: 1024 * 1024,
            state: ReleaseState::New,
            category: Category::Unknown,
            category_raw: String::new(),
            published_at: None,
            discovered_at: Utc::now(),
            uploaded_at: None,
            source_id: None,
            agent_id: None,
            meta_files,
        }
    }

    /// An enabled agent record with id `id`, reserving no disk space.
    pub fn agent(id: &str) -> Agent {
        Agent {
            id: id.to_string(),
            name: format!("agent-{}", id),
            url: format!("http://{}.agents.invalid", id),
            enabled: true,
            statistics_interval_secs: 10,
            list_interval_secs: 5,
            min_free_disk_space: 0,
            files_submitted: 0,
            last_statistics_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn statistics(free: i64) -> AgentStatistics {
        AgentStatistics {
            server_load: vec![0.1, 0.1, 0.1],
            disk_total_space: free * 2,
            disk_free_space: free,
        }
    }

    /// An enabled source record with id `id`, never checked.
    pub fn source(id: &str) -> SourceRecord {
        SourceRecord {
            id: id.to_string(),
            name: format!("source-{}", id),
            url: format!("http://{}.sources.invalid/feed", id),
            enabled: true,
            interval_secs: 300,
            last_check: None,
            times_checked: 0,
            releases_found: 0,
            created_at: Utc::now(),
        }
    }
}
