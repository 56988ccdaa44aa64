//! Podcast feed rendering.
//!
//! Turns the retained entries of a channel into an RSS 2.0 document with the
//! iTunes and Media RSS namespaces, using the [`rss`] crate.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use rss::extension::itunes::{ITunesChannelExtension, ITunesItemExtension};
use rss::extension::Extension;
use rss::{Channel, Enclosure, Guid, Item};
use tracing::warn;

use crate::config::{ChannelType, FeedInfo};
use crate::error::Result;
use crate::source::Entry;

pub const MEDIA_NAMESPACE: &str = "http://search.yahoo.com/mrss/";
pub const ENCLOSURE_TYPE: &str = "audio/mpeg";

const PLAYLIST_URL: &str = "https://www.youtube.com/playlist?list=";

/// RFC 822 with a numeric zone, e.g. `02 Jan 06 15:04 -0700`.
const RFC822Z: &str = "%d %b %y %H:%M %z";

pub fn rfc822z(ts: &DateTime<Utc>) -> String {
    ts.format(RFC822Z).to_string()
}

/// Render `entries` as a pretty-printed feed.
///
/// Returns an empty string when there are no entries; callers must not
/// persist it.  Enclosure links are `base_url` joined with each file's base
/// name, and enclosure lengths come from the files on disk.
pub fn render(
    feed: &FeedInfo,
    entries: &[Entry],
    base_url: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let Some(first) = entries.first() else {
        return Ok(String::new());
    };

    let items: Vec<Item> = entries.iter().map(|e| make_item(e, base_url)).collect();

    let mut channel = Channel::default();
    channel.set_title(feed.name.clone());
    channel.set_description("generated by tubecast");
    channel.set_link(match feed.kind {
        ChannelType::Playlist => format!("{PLAYLIST_URL}{}", feed.id),
        ChannelType::Channel => first.author.uri.clone(),
    });
    channel.set_pub_date(items[0].pub_date().map(String::from));
    channel.set_last_build_date(rfc822z(&now));
    if !feed.language.is_empty() {
        channel.set_language(feed.language.clone());
    }

    let mut namespaces = BTreeMap::new();
    namespaces.insert("media".to_string(), MEDIA_NAMESPACE.to_string());
    channel.set_namespaces(namespaces);

    // Always present so the itunes namespace is declared even without an image.
    let mut itunes = ITunesChannelExtension::default();
    if !first.thumbnail.is_empty() {
        itunes.set_image(first.thumbnail.clone());
        channel.set_extensions(media_thumbnail(&first.thumbnail));
    }
    channel.set_itunes_ext(itunes);
    channel.set_items(items);

    let buf = channel.pretty_write_to(Vec::new(), b' ', 2)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn make_item(entry: &Entry, base_url: &str) -> Item {
    let base_name = Path::new(&entry.file)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let length = match std::fs::metadata(&entry.file) {
        Ok(meta) => meta.len(),
        Err(e) => {
            warn!(file = %entry.file, video_id = %entry.video_id, title = %entry.title, error = %e,
                "failed to get file size");
            0
        }
    };

    let mut enclosure = Enclosure::default();
    enclosure.set_url(format!("{}/{}", base_url.trim_end_matches('/'), base_name));
    enclosure.set_length(length.to_string());
    enclosure.set_mime_type(ENCLOSURE_TYPE);

    let mut guid = Guid::default();
    guid.set_value(entry.uid());
    guid.set_permalink(false);

    let mut item = Item::default();
    item.set_title(entry.title.clone());
    item.set_description(entry.description.clone());
    item.set_link(entry.link.clone());
    item.set_pub_date(rfc822z(&entry.published));
    item.set_author(entry.author.name.clone());
    item.set_guid(guid);
    item.set_enclosure(enclosure);

    if entry.duration > 0 {
        let mut itunes = ITunesItemExtension::default();
        itunes.set_duration(entry.duration.to_string());
        item.set_itunes_ext(itunes);
    }
    item
}

fn media_thumbnail(url: &str) -> rss::extension::ExtensionMap {
    let mut ext = Extension::default();
    ext.set_name("media:thumbnail");
    ext.attrs = BTreeMap::from([("url".to_string(), url.to_string())]);

    let mut by_name = BTreeMap::new();
    by_name.insert("thumbnail".to_string(), vec![ext]);
    let mut map = BTreeMap::new();
    map.insert("media".to_string(), by_name);
    map
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
