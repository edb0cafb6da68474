//! Bencoded torrent metadata codec.
//!
//! A [`Structure`] keeps the `info` dictionary exactly as it was decoded and
//! exposes a typed view of it. Only the envelope fields (announce, comment,
//! creator, creation date, private flag, bot) are rewritable, so the content
//! hash survives every re-announce.

mod files;
mod structure;
mod tree;

pub use files::{sort_files, FileEntry};
pub use structure::{Info, Structure};
pub use tree::{HierarchicalFile, HierarchicalFolder};

use thiserror::Error;

/// Errors raised while decoding or encoding metadata structures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed bencode: {0}")]
    Bencode(#[from] serde_bencode::Error),

    #[error("malformed metadata structure: {0}")]
    MalformedFormat(String),
}
