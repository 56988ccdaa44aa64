//! In-memory collaborator doubles for tests.
//!
//! Each double records its calls so tests can assert on what the service
//! asked for, and can be told to fail on demand.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::{ChannelType, FeedInfo, ServiceConfig};
use crate::duration::tests::mp3_frames;
use crate::service::Service;
use crate::source::{Author, ChannelLister, Downloader, Entry, RssSink, Store};

/// Shorthand constructor for tests.
pub fn make_entry(channel: &str, video: &str, published: DateTime<Utc>) -> Entry {
    Entry {
        channel_id: channel.to_string(),
        video_id: video.to_string(),
        title: format!("title {video}"),
        description: format!("about {video}"),
        author: Author {
            name: "author".to_string(),
            uri: format!("https://www.youtube.com/channel/{channel}"),
        },
        link: format!("https://www.youtube.com/watch?v={video}"),
        thumbnail: String::new(),
        published,
        updated: None,
        file: String::new(),
        duration: 0,
    }
}

pub fn feed_info(name: &str, id: &str, keep: usize) -> FeedInfo {
    FeedInfo {
        name: name.to_string(),
        id: id.to_string(),
        kind: ChannelType::Channel,
        keep,
        language: "en-us".to_string(),
    }
}

pub fn config(channels: Vec<FeedInfo>) -> ServiceConfig {
    ServiceConfig {
        channels,
        check_interval: 1,
        keep_per_channel: 5,
        base_url: "http://example.com/yt".to_string(),
        rss_location: PathBuf::new(),
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct StoreState {
    pub entries: HashMap<String, Entry>,
    pub processed: HashMap<String, DateTime<Utc>>,
    pub last: Option<Entry>,
    pub fail_exists: bool,
    pub fail_check_processed: bool,
    pub fail_save: bool,
    /// Report every save as a duplicate without storing it.
    pub dup_on_save: bool,
    pub fail_mark: bool,
    pub fail_remove_old: bool,
    pub saves: usize,
    pub remove_old_calls: Vec<(String, usize)>,
}

#[derive(Default)]
pub struct MemoryStore {
    pub state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn with<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn channel_entries(&self, channel_id: &str) -> Vec<Entry> {
        self.with(|s| sorted(s, channel_id))
    }
}

fn sorted(s: &StoreState, channel_id: &str) -> Vec<Entry> {
    let mut res: Vec<Entry> = s
        .entries
        .values()
        .filter(|e| e.channel_id == channel_id)
        .cloned()
        .collect();
    res.sort_by(|a, b| b.published.cmp(&a.published).then(a.video_id.cmp(&b.video_id)));
    res
}

impl Store for MemoryStore {
    fn save(&self, entry: &Entry) -> Result<bool> {
        self.with(|s| {
            if s.fail_save {
                return Err(anyhow!("save failed"));
            }
            s.saves += 1;
            if s.dup_on_save || s.entries.contains_key(&entry.uid()) {
                return Ok(false);
            }
            s.entries.insert(entry.uid(), entry.clone());
            Ok(true)
        })
    }

    fn load(&self, channel_id: &str, max: usize) -> Result<Vec<Entry>> {
        Ok(self.with(|s| sorted(s, channel_id).into_iter().take(max).collect()))
    }

    fn exists(&self, entry: &Entry) -> Result<bool> {
        self.with(|s| {
            if s.fail_exists {
                return Err(anyhow!("exists failed"));
            }
            Ok(s.entries.contains_key(&entry.uid()))
        })
    }

    fn remove_old(&self, channel_id: &str, keep: usize) -> (Vec<String>, Result<()>) {
        self.with(|s| {
            s.remove_old_calls.push((channel_id.to_string(), keep));
            let mut files = Vec::new();
            for e in sorted(s, channel_id).into_iter().skip(keep) {
                s.entries.remove(&e.uid());
                files.push(e.file);
            }
            let res = if s.fail_remove_old {
                Err(anyhow!("partial remove"))
            } else {
                Ok(())
            };
            (files, res)
        })
    }

    fn mark_processed(&self, entry: &Entry) -> Result<()> {
        self.with(|s| {
            if s.fail_mark {
                return Err(anyhow!("mark failed"));
            }
            s.processed.insert(entry.uid(), Utc::now());
            s.last = Some(entry.clone());
            Ok(())
        })
    }

    fn check_processed(&self, entry: &Entry) -> Result<Option<DateTime<Utc>>> {
        self.with(|s| {
            if s.fail_check_processed {
                return Err(anyhow!("check failed"));
            }
            Ok(s.processed.get(&entry.uid()).copied())
        })
    }

    fn reset_processed(&self, entry: &Entry) -> Result<()> {
        self.with(|s| {
            s.processed.remove(&entry.uid());
            Ok(())
        })
    }

    fn remove(&self, entry: &Entry) -> Result<()> {
        self.with(|s| match s.entries.remove(&entry.uid()) {
            Some(_) => Ok(()),
            None => Err(anyhow!("no entry {}", entry.uid())),
        })
    }

    fn count_processed(&self) -> usize {
        self.with(|s| s.processed.len())
    }

    fn last(&self) -> Result<Entry> {
        self.with(|s| s.last.clone().ok_or_else(|| anyhow!("no processed entries")))
    }
}

// ---------------------------------------------------------------------------
// Lister
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ScriptedLister {
    /// Channel id to listing; a missing channel fails.
    pub listings: Mutex<HashMap<String, Vec<Entry>>>,
    pub calls: Mutex<Vec<String>>,
    /// Cancel this token once `list` has been called this many times.
    pub cancel_after: Mutex<Option<(usize, CancellationToken)>>,
}

impl ScriptedLister {
    pub fn set(&self, channel_id: &str, entries: Vec<Entry>) {
        self.listings
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), entries);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChannelLister for ScriptedLister {
    async fn list(
        &self,
        _token: &CancellationToken,
        channel_id: &str,
        _kind: ChannelType,
    ) -> Result<Vec<Entry>> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(channel_id.to_string());
            calls.len()
        };
        if let Some((after, token)) = self.cancel_after.lock().unwrap().as_ref() {
            if n >= *after {
                token.cancel();
            }
        }
        self.listings
            .lock()
            .unwrap()
            .get(channel_id)
            .cloned()
            .ok_or_else(|| anyhow!("channel {channel_id} not found"))
    }
}

// ---------------------------------------------------------------------------
// Downloader
// ---------------------------------------------------------------------------

/// Writes a small MP3 file per download into `dir`.
pub struct FakeDownloader {
    pub dir: PathBuf,
    pub fail: Mutex<HashSet<String>>,
    pub calls: Mutex<Vec<(String, String)>>,
    done: Mutex<usize>,
    /// Cancel this token after this many successful downloads.
    pub cancel_after: Mutex<Option<(usize, CancellationToken)>>,
}

impl FakeDownloader {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            fail: Mutex::default(),
            calls: Mutex::default(),
            done: Mutex::default(),
            cancel_after: Mutex::default(),
        }
    }

    pub fn fail_on(&self, video_id: &str) {
        self.fail.lock().unwrap().insert(video_id.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn fetch(
        &self,
        _token: &CancellationToken,
        video_id: &str,
        file_name: &str,
    ) -> Result<PathBuf> {
        self.calls
            .lock()
            .unwrap()
            .push((video_id.to_string(), file_name.to_string()));
        if self.fail.lock().unwrap().contains(video_id) {
            return Err(anyhow!("can't download {video_id}"));
        }

        let path = self.dir.join(format!("{file_name}.mp3"));
        // 400 frames, a bit over 10 seconds
        std::fs::write(&path, mp3_frames(400))?;

        let done = {
            let mut done = self.done.lock().unwrap();
            *done += 1;
            *done
        };
        if let Some((after, token)) = self.cancel_after.lock().unwrap().as_ref() {
            if done >= *after {
                token.cancel();
            }
        }
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSink {
    pub saved: Mutex<Vec<(String, String)>>,
    pub fail: Mutex<bool>,
}

impl RecordingSink {
    pub fn count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }

    pub fn last_for(&self, channel_id: &str) -> Option<String> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| id == channel_id)
            .map(|(_, xml)| xml.clone())
    }
}

impl RssSink for RecordingSink {
    fn persist(&self, channel_id: &str, xml: &str) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(anyhow!("disk full"));
        }
        self.saved
            .lock()
            .unwrap()
            .push((channel_id.to_string(), xml.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

/// Collects formatted `tracing` output for assertions.
#[derive(Clone, Default)]
pub struct Logs(Arc<Mutex<Vec<u8>>>);

impl Logs {
    /// Install a subscriber writing into this buffer for the current thread.
    pub fn capture(&self) -> tracing::subscriber::DefaultGuard {
        let logs = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || logs.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for Logs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// A service wired to fresh doubles, with handles kept for assertions.
pub struct Harness {
    pub service: Service,
    pub lister: Arc<ScriptedLister>,
    pub downloader: Arc<FakeDownloader>,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingSink>,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(channels: Vec<FeedInfo>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let lister = Arc::new(ScriptedLister::default());
        let downloader = Arc::new(FakeDownloader::new(dir.path()));
        let store = Arc::new(MemoryStore::default());
        let sink = Arc::new(RecordingSink::default());
        let service = Service::new(
            config(channels),
            lister.clone(),
            downloader.clone(),
            store.clone(),
            sink.clone(),
        );
        Self {
            service,
            lister,
            downloader,
            store,
            sink,
            dir,
        }
    }
}
