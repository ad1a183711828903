//! Periodic sentence broadcast.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::event::Event;
use crate::location::{Feed, FixSource, Snapshot};
use crate::nmea::{self, Kind};
use crate::registry::Registry;


pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

/// Pause between RMC and GGA, so receivers parse them as separate messages.
pub const SENTENCE_GAP: Duration = Duration::from_millis(200);


/// Scheduler sending RMC and GGA to all sessions once per interval.
///
/// The first tick fires immediately. Ticks never overlap: a tick that runs
/// late delays the following ones. Dropping the broadcaster cancels it.
pub struct Broadcaster {
    interval: Duration,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Broadcaster {
    pub fn start(registry: Arc<Registry>, feed: Feed, interval: Duration) -> Self {
        let interval = if interval.is_zero() { DEFAULT_INTERVAL } else { interval };

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(registry, feed, interval, cancel.clone()));

        Self { interval, cancel, task }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop scheduling. A tick in progress is abandoned.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Broadcaster {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}


async fn run(registry: Arc<Registry>, feed: Feed, interval: Duration, cancel: CancellationToken) {
    tracing::debug!(interval_ms=interval.as_millis() as u64, "broadcaster started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {},
        }

        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            _ = tick(&registry, &feed) => {},
        }
    }

    tracing::debug!("broadcaster stopped");
}

/// Sentence of the given kind for this tick: the raw one if usable, otherwise
/// synthesized from the last fix. The flag tells whether the raw one was used.
fn sentence(snapshot: &Snapshot, kind: Kind, max_age: Duration) -> Option<(String, bool)> {
    let location = snapshot.location.as_ref()?;

    if let Some(raw) = snapshot.usable_raw(kind, Instant::now(), max_age) {
        let mut text = raw.to_string();
        if !text.ends_with("\r\n") {
            text.truncate(text.trim_end_matches(['\r', '\n']).len());
            text.push_str("\r\n");
        }
        return Some((text, true));
    }

    let text = match kind {
        Kind::Rmc => nmea::encode_rmc(location),
        Kind::Gga => nmea::encode_gga(location),
    };

    Some((text, false))
}

async fn send(registry: &Registry, kind: Kind, text: String) {
    tracing::trace!(%kind, sentence=text.trim_end(), "sending sentence");
    registry.write(Bytes::from(text)).await;
}

pub(crate) async fn tick(registry: &Registry, feed: &Feed) {
    let snapshot = feed.snapshot();

    let Some(location) = snapshot.location.as_ref() else {
        tracing::trace!("no location yet, skipping broadcast");
        return;
    };

    let rmc = sentence(&snapshot, Kind::Rmc, feed.max_age());

    let source = match rmc {
        Some((_, true)) => FixSource::Gps,
        _ => FixSource::Network,
    };

    registry.emit(Event::Location {
        latitude: location.latitude,
        longitude: location.longitude,
        source,
    });

    if let Some((text, _)) = rmc {
        send(registry, Kind::Rmc, text).await;
    }

    tokio::time::sleep(SENTENCE_GAP).await;

    let snapshot = feed.snapshot();
    if let Some((text, _)) = sentence(&snapshot, Kind::Gga, feed.max_age()) {
        send(registry, Kind::Gga, text).await;
    }
}
