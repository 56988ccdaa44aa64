//! Collaborator abstraction layer.
//!
//! This module defines the capability traits the service is wired with and
//! the common [`Entry`] type.  The service never talks to the network, the
//! downloader or the database directly; it only sees these traits.
//!
//! ## For contributors: adding a collaborator
//!
//! 1. Implement the relevant trait ([`ChannelLister`], [`Downloader`],
//!    [`Store`] or [`RssSink`]) in your own crate or module.
//! 2. Pass it, wrapped in an `Arc`, to [`Service::new`](crate::Service::new).
//!
//! The dedup, retention and feed logic are collaborator-agnostic.

mod entry;
mod rss_file;

pub use entry::{Author, Entry};
pub use rss_file::RssFileStore;

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::ChannelType;

/// Lists candidate entries for a channel or playlist.
///
/// Entries come back in the order the remote source presents them; the
/// service does not re-sort.  Implementations should stop early when the
/// token is cancelled.
#[async_trait]
pub trait ChannelLister: Send + Sync {
    async fn list(
        &self,
        token: &CancellationToken,
        channel_id: &str,
        kind: ChannelType,
    ) -> Result<Vec<Entry>>;
}

/// Fetches and transcodes a video's audio to a local file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `video_id` to a file named after `file_name` and return the
    /// full local path.
    async fn fetch(
        &self,
        token: &CancellationToken,
        video_id: &str,
        file_name: &str,
    ) -> Result<PathBuf>;
}

/// Durable metadata about downloaded entries.
///
/// A missing record is never an error: lookups return `false` / `None`.
pub trait Store: Send + Sync {
    /// Insert an entry. `Ok(false)` means it already existed and was not
    /// inserted.
    fn save(&self, entry: &Entry) -> Result<bool>;

    /// Up to `max` entries of a channel, newest first.
    fn load(&self, channel_id: &str, max: usize) -> Result<Vec<Entry>>;

    fn exists(&self, entry: &Entry) -> Result<bool>;

    /// Keep the newest `keep` entries of a channel and drop the rest.
    ///
    /// Returns the files of the dropped entries.  The list is authoritative
    /// even when an error is also returned.
    fn remove_old(&self, channel_id: &str, keep: usize) -> (Vec<String>, Result<()>);

    /// Record that the entry was processed.  Survives `remove_old`.
    fn mark_processed(&self, entry: &Entry) -> Result<()>;

    /// Look up the processed mark, with the time it was recorded.
    fn check_processed(&self, entry: &Entry) -> Result<Option<DateTime<Utc>>>;

    /// Forget the processed mark of an entry.
    fn reset_processed(&self, entry: &Entry) -> Result<()>;

    /// Delete a single metadata row.
    fn remove(&self, entry: &Entry) -> Result<()>;

    /// Number of processed marks ever recorded.
    fn count_processed(&self) -> usize;

    /// The most recently processed entry.
    fn last(&self) -> Result<Entry>;
}

/// Persists a rendered feed document.
pub trait RssSink: Send + Sync {
    fn persist(&self, channel_id: &str, xml: &str) -> Result<()>;
}
