use thiserror::Error;

use crate::types::ListId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Version conflict on list {list_id}: known version {known}, stored version {stored}")]
    VersionConflict {
        list_id: ListId,
        known: u64,
        stored: u64,
    },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("You are logged out, please log in again")]
    SessionExpired,

    #[error("{0}")]
    Logical(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// The request never completed; the caller may retry by hand.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Http(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::VersionConflict { .. })
    }

    pub fn is_recoverable(&self) -> bool {
        self.is_transport()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
