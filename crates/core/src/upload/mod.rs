//! Uploading finished releases to the destination tracker.

mod config;
mod coordinator;
mod destination;

pub use config::UploadConfig;
pub use coordinator::UploadCoordinator;
pub use destination::{Destination, HttpDestination, NoDestination, Submission};

use thiserror::Error;

use crate::agent::AgentError;
use crate::codec::CodecError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("uploads are not configured")]
    NotConfigured,

    #[error("missing artifact: {0}")]
    MissingArtifact(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("rewritten structure hash {actual} differs from {expected}")]
    HashChanged { expected: String, actual: String },

    #[error("destination request failed: {0}")]
    Request(String),

    #[error("invalid destination response: {0}")]
    InvalidResponse(String),

    #[error("destination rejected upload: {0}")]
    Rejected(String),

    #[error("re-announce to agent failed: {0}")]
    Reannounce(#[from] AgentError),
}
