//! Error type for the ingestion core.
//!
//! Collaborators report failures as [`anyhow::Error`]; the service wraps
//! them into [`Error`] variants naming the phase that failed.  Recoverable
//! failures never reach this type, they are logged where they happen.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The cancellation token fired.  Returned as-is, never wrapped.
    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to check if entry {video_id} exists")]
    CheckEntry {
        video_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to save entry {uid}")]
    SaveEntry {
        uid: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to get channel entries for {channel_id}")]
    LoadEntries {
        channel_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to marshal rss")]
    Render(#[from] rss::Error),

    #[error("failed to save rss for {channel_id}")]
    StoreRss {
        channel_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to remove entry {video_id}")]
    RemoveEntry {
        video_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to process channels")]
    ProcessChannels(#[source] Box<Error>),

    #[error("failed to read config {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    ConfigInvalid(String),
}

impl Error {
    /// True when the error is (or wraps) a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::ProcessChannels(inner) => inner.is_cancelled(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
