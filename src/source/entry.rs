//! The core data type shared by every collaborator.
//!
//! `Entry` represents a single remote video as returned by a channel
//! lister.  The lister builds fresh entries on every call; an entry only
//! becomes durable once the service has downloaded its audio and handed it
//! to the [`Store`](super::Store).
//!
//! ## For contributors
//!
//! The `file` and `duration` fields are owned by the service.  Listers leave
//! them empty; they are filled in exactly once, when the entry moves from
//! "new" to "processed".

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Author of an entry, usually the channel owner.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    /// Link to the author's channel page.
    pub uri: String,
}

/// A single remote media item and its processing state.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Channel or playlist the entry was listed under.
    pub channel_id: String,
    /// Remote video identifier, unique within the channel.
    pub video_id: String,

    /// Human-readable headline.  Prefixed with the channel's display name
    /// once processed.
    pub title: String,

    /// Media description text.
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub author: Author,

    /// URL of the original video page.
    #[serde(default)]
    pub link: String,

    /// Thumbnail URL, empty if the source has none.
    #[serde(default)]
    pub thumbnail: String,

    /// Source-provided publication time.  May be reset to the processing
    /// time for fresh uploads.
    pub published: DateTime<Utc>,

    /// Source-provided last-modified time.
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,

    /// Local audio file, empty until downloaded.
    #[serde(default)]
    pub file: String,

    /// Playback length in seconds, 0 until computed.
    #[serde(default)]
    pub duration: u32,
}

impl Entry {
    /// Stable dedup key: `channel_id::video_id`.
    pub fn uid(&self) -> String {
        format!("{}::{}", self.channel_id, self.video_id)
    }

    /// The most recent timestamp the source knows about.
    ///
    /// `updated` wins only when it is set and later than `published`;
    /// sources occasionally report a `published` newer than `updated`.
    pub fn last_timestamp(&self) -> DateTime<Utc> {
        match self.updated {
            Some(updated) if updated > self.published => updated,
            _ => self.published,
        }
    }

    /// Destination name handed to the downloader, hex SHA-1 of the UID.
    ///
    /// Deterministic so a retried download lands on the same path.
    pub fn file_name(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.uid().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}",
            self.uid(),
            self.title,
            self.published.to_rfc3339(),
            self.file
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
