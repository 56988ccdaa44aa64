//! Periodic channel polling.
//!
//! [`Service::run`] processes every channel once right away, then again on
//! every tick of a fixed interval, until the cancellation token fires or a
//! cycle fails.
//!
//! ## For contributors
//!
//! The loop is sequential: one cycle at a time, channel by
//! channel, entry by entry.  Nothing is spawned per channel or per entry, so
//! no work outlives the iteration that started it.  Concurrency, if any,
//! lives inside the collaborators.

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{Error, Result};
use crate::service::Service;

impl Service {
    /// Block until `token` is cancelled or a cycle fails.
    ///
    /// Cancellation is returned as [`Error::Cancelled`], never wrapped; any
    /// other cycle failure comes back as [`Error::ProcessChannels`].
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        info!("starting tubecast service");
        for feed in self.feeds() {
            info!(name = %feed.name, id = %feed.id, kind = ?feed.kind, keep = feed.keep,
                lang = %feed.language, "watching feed");
        }

        let mut tick = interval(self.config.check_duration());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately; the first cycle doesn't wait
        tick.tick().await;

        self.cycle(&token).await?;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Error::Cancelled),
                _ = tick.tick() => self.cycle(&token).await?,
            }
        }
    }

    async fn cycle(&self, token: &CancellationToken) -> Result<()> {
        match self.process_channels(token).await {
            Ok(_) => Ok(()),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => Err(Error::ProcessChannels(Box::new(e))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
