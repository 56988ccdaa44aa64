//! tubecast: turns video channels into podcast feeds.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────┐  cycle  ┌────────────┐ list/fetch/save ┌───────────────┐
//! │ poll.rs  │ ──────► │ service.rs │ ──────────────► │   source/     │
//! │ (timer)  │         │ (dedup)    │                 │ collaborators │
//! └──────────┘         └────────────┘                 └───────────────┘
//!                        │         │
//!                        ▼         ▼
//!              ┌─────────────┐ ┌─────────┐
//!              │ duration.rs │ │ feed.rs │ ──► RssSink
//!              └─────────────┘ └─────────┘
//! ```
//!
//! * **`source/`**: the collaborator traits and the [`Entry`] model, plus
//!   the filesystem feed sink.
//! * **`poll`**: [`Service::run`], one cycle at start then one per tick.
//! * **`service`**: dedup, download, retention and feed regeneration for
//!   each channel.
//! * **`duration`**: MP3 playback length from the frame stream.
//! * **`feed`**: RSS 2.0 rendering with iTunes and Media RSS namespaces.
//! * **`config`**: YAML configuration of the watched channels.
//!
//! Listing, downloading and metadata storage are supplied by the embedding
//! application through the traits in [`source`].  Installing a `tracing`
//! subscriber is the embedder's job too.

pub mod config;
pub mod duration;
pub mod error;
pub mod feed;
mod poll;
pub mod service;
pub mod source;

#[cfg(test)]
mod mocks;

pub use config::{ChannelType, FeedInfo, ServiceConfig};
pub use error::{Error, Result};
pub use service::{Service, Stats};
pub use source::{Author, ChannelLister, Downloader, Entry, RssFileStore, RssSink, Store};
