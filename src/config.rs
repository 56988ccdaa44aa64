//! Service configuration.
//!
//! Loaded from YAML, for example:
//!
//! ```yaml
//! check_interval: 600
//! keep_per_channel: 10
//! base_url: https://example.com/yt/media
//! rss_location: /srv/var/rss
//! channels:
//!   - name: Alpha
//!     id: UCxxxxxxxxxxxxxxxxxxxxxx
//!     keep: 5
//!     lang: en-us
//!   - name: Talks
//!     id: PLxxxxxxxxxxxxxxxxxxxxxx
//!     type: playlist
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Whether a feed id names a channel or a playlist.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    #[default]
    Channel,
    Playlist,
}

/// One watched channel or playlist.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct FeedInfo {
    /// Display name, used as feed title and title prefix.
    pub name: String,
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: ChannelType,
    /// Per-channel retention, 0 means "use the global default".
    #[serde(default)]
    pub keep: usize,
    #[serde(rename = "lang", default)]
    pub language: String,
}

fn default_check_interval() -> u64 {
    600
}

fn default_keep() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub channels: Vec<FeedInfo>,
    /// Seconds between cycles.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    #[serde(default = "default_keep")]
    pub keep_per_channel: usize,
    /// Public URL prefix for enclosure links.
    #[serde(default)]
    pub base_url: String,
    /// Directory the file sink writes feeds to.
    #[serde(default)]
    pub rss_location: PathBuf,
}

impl ServiceConfig {
    /// Read and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        let cfg: ServiceConfig = serde_yaml::from_str(data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.check_interval == 0 {
            return Err(Error::ConfigInvalid("check_interval must be positive".into()));
        }
        if self.keep_per_channel == 0 {
            return Err(Error::ConfigInvalid("keep_per_channel must be positive".into()));
        }
        if self.channels.is_empty() {
            return Err(Error::ConfigInvalid("no channels configured".into()));
        }
        let mut seen = HashSet::new();
        for ch in &self.channels {
            if ch.id.is_empty() {
                return Err(Error::ConfigInvalid(format!("channel {:?} has no id", ch.name)));
            }
            if !seen.insert(ch.id.as_str()) {
                return Err(Error::ConfigInvalid(format!("duplicate channel id {}", ch.id)));
            }
        }
        Ok(())
    }

    pub fn check_duration(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    /// Effective retention for a feed: its own `keep` if set, else the default.
    pub fn keep_for(&self, feed: &FeedInfo) -> usize {
        if feed.keep > 0 {
            feed.keep
        } else {
            self.keep_per_channel
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
