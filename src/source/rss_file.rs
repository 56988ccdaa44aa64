//! Filesystem feed sink.
//!
//! Writes each channel's feed to `<location>/<channel_id>.xml`.  Use it as a
//! template when publishing feeds somewhere else (object storage, a cache).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::RssSink;

/// Stores rendered feeds as plain files.
pub struct RssFileStore {
    /// Directory holding one `.xml` file per channel.
    pub location: PathBuf,
}

impl RssFileStore {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// Path of the feed file for a channel.
    pub fn path_for(&self, channel_id: &str) -> PathBuf {
        self.location.join(format!("{channel_id}.xml"))
    }
}

impl RssSink for RssFileStore {
    fn persist(&self, channel_id: &str, xml: &str) -> Result<()> {
        std::fs::create_dir_all(&self.location)
            .with_context(|| format!("can't create {}", self.location.display()))?;

        // Write next to the target then rename, so readers never see a
        // half-written feed.
        let target = self.path_for(channel_id);
        let tmp = tmp_path(&target);
        std::fs::write(&tmp, xml).with_context(|| format!("can't write {}", tmp.display()))?;
        std::fs::rename(&tmp, &target)
            .with_context(|| format!("can't rename {} to {}", tmp.display(), target.display()))?;
        Ok(())
    }
}

fn tmp_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    target.with_file_name(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
