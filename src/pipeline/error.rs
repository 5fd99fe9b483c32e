//! Error types for the ledger's external collaborators
//!
//! None of these reach the caller of `on_event` or the flush timer: lookup
//! errors fall back to defaults, sink errors drop the batch, and source
//! errors skip the offending line.

use super::types::{ActorId, GroupId};
use thiserror::Error;

/// Settings or roster lookup failure
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("member {actor_id} not found in group {group_id}")]
    UnknownMember { actor_id: ActorId, group_id: GroupId },

    #[error("settings database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Batch commit failure
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inbound event stream failure
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed event on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
