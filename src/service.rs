//! Channel processing.
//!
//! For each configured channel the service lists entries, skips the ones it
//! has already seen, downloads the rest, records them in the store, trims
//! old entries and regenerates the channel's feed.
//!
//! Failure policy:
//!
//! * listing failure: the channel is skipped for this cycle;
//! * download failure, duplicate save, missing processed mark, file removal
//!   and feed render/persist failures: logged, processing continues;
//! * store failures during the dedup check or save, and cancellation: the
//!   cycle stops with an [`Error`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{FeedInfo, ServiceConfig};
use crate::duration::duration;
use crate::error::{Error, Result};
use crate::feed;
use crate::source::{ChannelLister, Downloader, Entry, RssSink, Store};

/// Entries newer than this get their published time reset on download.
const FRESH_WINDOW_HOURS: i64 = 24;

/// Per-cycle counters, accumulated across all channels.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct Stats {
    /// Entries looked at, including the one that hit the retention budget.
    pub entries: usize,
    /// Entries accounted against the retention budget.
    pub processed: usize,
    /// Newly downloaded and saved.
    pub added: usize,
    /// Files removed by retention trimming.
    pub removed: usize,
    /// Failed downloads.
    pub ignored: usize,
    /// Already seen.
    pub skipped: usize,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entries: {}, processed: {}, updated: {}, removed: {}, ignored: {}, skipped: {}",
            self.entries, self.processed, self.added, self.removed, self.ignored, self.skipped
        )
    }
}

/// Downloads audio for the configured channels and publishes their feeds.
pub struct Service {
    pub(crate) config: ServiceConfig,
    lister: Arc<dyn ChannelLister>,
    downloader: Arc<dyn Downloader>,
    store: Arc<dyn Store>,
    sink: Arc<dyn RssSink>,
}

impl Service {
    pub fn new(
        config: ServiceConfig,
        lister: Arc<dyn ChannelLister>,
        downloader: Arc<dyn Downloader>,
        store: Arc<dyn Store>,
        sink: Arc<dyn RssSink>,
    ) -> Self {
        Self {
            config,
            lister,
            downloader,
            store,
            sink,
        }
    }

    pub fn feeds(&self) -> &[FeedInfo] {
        &self.config.channels
    }

    /// Run one cycle over every configured channel.
    pub async fn process_channels(&self, token: &CancellationToken) -> Result<Stats> {
        let mut stats = Stats::default();

        for feed in &self.config.channels {
            self.process_channel(token, feed, &mut stats).await?;
        }

        info!(
            channels = self.config.channels.len(),
            lifetime = self.store.count_processed(),
            "all channels processed - {stats}"
        );
        if let Ok(last) = self.store.last() {
            info!("last entry: {last}");
        }

        Ok(stats)
    }

    /// Process a single channel, adding its counters to `stats`.
    pub async fn process_channel(
        &self,
        token: &CancellationToken,
        feed: &FeedInfo,
        stats: &mut Stats,
    ) -> Result<()> {
        let keep = self.config.keep_for(feed);

        let entries = match self.lister.list(token, &feed.id, feed.kind).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(channel = %feed.id, error = %e, "failed to get channel entries");
                return Ok(());
            }
        };
        info!(channel = %feed.name, count = entries.len(), limit = keep, "got entries");

        let mut changed = false;
        let mut processed = 0;

        for (i, entry) in entries.into_iter().enumerate() {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            stats.entries += 1;
            if processed >= keep {
                break;
            }

            if !self.is_new(&entry, feed)? {
                stats.skipped += 1;
                processed += 1;
                continue;
            }

            info!(n = i + 1, video_id = %entry.video_id, title = %entry.title, channel = %feed.name,
                "new entry");

            let file = match self
                .downloader
                .fetch(token, &entry.video_id, &entry.file_name())
                .await
            {
                Ok(file) => file,
                Err(e) => {
                    stats.ignored += 1;
                    warn!(video_id = %entry.video_id, error = %e, "failed to download");
                    continue;
                }
            };
            processed += 1;
            info!(video_id = %entry.video_id, title = %entry.title, file = %file.display(),
                channel = %feed.name, "downloaded");

            let entry = self.update(entry, &file, feed).await;

            let inserted = self.store.save(&entry).map_err(|source| Error::SaveEntry {
                uid: entry.uid(),
                source,
            })?;
            if !inserted {
                warn!(entry = %entry, "attempt to save dup entry");
            }
            changed = true;

            if let Err(e) = self.store.mark_processed(&entry) {
                warn!(video_id = %entry.video_id, error = %e, "failed to set processed status");
            }
            stats.added += 1;
            info!(video_id = %entry.video_id, title = %entry.title, channel = %feed.name, "saved");
        }
        stats.processed += processed;

        if changed {
            stats.removed += self.remove_old(feed);

            match self.rss_feed(feed) {
                Ok(xml) if xml.is_empty() => {
                    warn!(channel = %feed.name, "no entries to publish, feed left untouched");
                }
                Ok(xml) => {
                    if let Err(e) = self.store_rss(&feed.id, &xml) {
                        warn!(channel = %feed.name, error = %e, "failed to save rss");
                    }
                }
                Err(e) => warn!(channel = %feed.name, error = %e, "failed to generate rss"),
            }
        }

        Ok(())
    }

    /// Decide whether an entry still needs downloading.
    ///
    /// An entry is new only when the store has neither a metadata row nor a
    /// processed mark for it.  The mark outlives retention trimming, so an
    /// entry that comes back after being trimmed is not fetched again.
    pub fn is_new(&self, entry: &Entry, feed: &FeedInfo) -> Result<bool> {
        let check_err = |source| Error::CheckEntry {
            video_id: entry.video_id.clone(),
            source,
        };

        if self.store.exists(entry).map_err(check_err)? {
            return Ok(false);
        }

        match self.store.check_processed(entry).map_err(check_err)? {
            Some(ts) => {
                debug!(video_id = %entry.video_id, channel = %feed.name, processed_at = %ts.to_rfc3339(),
                    "already processed");
                Ok(false)
            }
            None => Ok(true),
        }
    }

    /// Finalize a downloaded entry: file, published time, title and duration.
    ///
    /// The duration scan reads the whole file and runs on the blocking pool.
    pub(crate) async fn update(&self, mut entry: Entry, file: &Path, feed: &FeedInfo) -> Entry {
        entry.file = file.to_string_lossy().into_owned();

        // Reset fresh uploads to "now" so a batch posted at once keeps the
        // order we downloaded it in.  Old entries (a newly added channel)
        // keep their original time.
        let now = Utc::now();
        if now - entry.last_timestamp() < Duration::hours(FRESH_WINDOW_HOURS) {
            debug!(video_id = %entry.video_id, from = %entry.published.to_rfc3339(),
                to = %now.to_rfc3339(), "reset published time");
            entry.published = now;
        } else {
            debug!(video_id = %entry.video_id, published = %entry.published.to_rfc3339(),
                "keep published time");
        }

        if !entry.title.contains(&feed.name) {
            entry.title = format!("{}: {}", feed.name, entry.title);
        }

        let path = file.to_path_buf();
        entry.duration = match tokio::task::spawn_blocking(move || duration(path)).await {
            Ok(secs) => secs,
            Err(e) => {
                warn!(video_id = %entry.video_id, error = %e, "duration scan did not finish");
                0
            }
        };
        entry
    }

    /// Trim a channel to its retention count and delete the dropped files.
    ///
    /// Returns the number of files actually removed.  Processed marks stay.
    pub fn remove_old(&self, feed: &FeedInfo) -> usize {
        let (files, res) = self.store.remove_old(&feed.id, self.config.keep_for(feed));
        if let Err(e) = res {
            warn!(channel = %feed.id, error = %e, "failed to remove some old meta data");
        }

        let mut removed = 0;
        for f in files {
            if let Err(e) = std::fs::remove_file(&f) {
                warn!(file = %f, error = %e, "failed to remove file");
                continue;
            }
            removed += 1;
            info!(file = %f, channel = %feed.id, name = %feed.name, "removed");
        }
        removed
    }

    /// Render the feed for a channel from the store's retained entries.
    ///
    /// An empty string means the channel has nothing to publish.
    pub fn rss_feed(&self, feed: &FeedInfo) -> Result<String> {
        let entries = self
            .store
            .load(&feed.id, self.config.keep_for(feed))
            .map_err(|source| Error::LoadEntries {
                channel_id: feed.id.clone(),
                source,
            })?;
        feed::render(feed, &entries, &self.config.base_url, Utc::now())
    }

    /// Persist a rendered feed through the sink.
    pub fn store_rss(&self, channel_id: &str, xml: &str) -> Result<()> {
        self.sink
            .persist(channel_id, xml)
            .map_err(|source| Error::StoreRss {
                channel_id: channel_id.to_string(),
                source,
            })
    }

    /// Forget an entry so the next cycle downloads it again.
    ///
    /// Clears the processed mark and the metadata row, then deletes the
    /// local file.  A failed file removal is only logged.
    pub fn remove_entry(&self, entry: &Entry) -> Result<()> {
        let remove_err = |source| Error::RemoveEntry {
            video_id: entry.video_id.clone(),
            source,
        };
        self.store.reset_processed(entry).map_err(remove_err)?;
        self.store.remove(entry).map_err(remove_err)?;

        if !entry.file.is_empty() {
            if let Err(e) = std::fs::remove_file(&entry.file) {
                warn!(file = %entry.file, error = %e, "failed to remove file");
            }
        }
        info!(entry = %entry, "removed entry");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
