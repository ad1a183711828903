//! Position input supplied by the host.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::nmea::Kind;


/// How long a raw sentence stays usable after it was observed.
pub const DEFAULT_RAW_MAX_AGE: Duration = Duration::from_secs(5);


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixSource {
    Gps,
    Network,
}

impl FixSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixSource::Gps => "GPS",
            FixSource::Network => "NETWORK",
        }
    }
}

impl std::fmt::Display for FixSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}


/// A single position fix.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSample {
    /// UTC time of the fix, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level.
    pub altitude: f64,
    /// Speed over ground, in the unit the receiving radios expect (knots).
    pub speed: f64,
    /// Degrees from true north.
    pub bearing: f64,
    /// Horizontal accuracy in meters.
    pub accuracy: f64,
    pub satellites: Option<u8>,
    pub source: FixSource,
}


/// A sentence as reported by the positioning hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSentence {
    pub text: String,
    pub valid: bool,
    pub observed_at: Instant,
}


#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub location: Option<LocationSample>,
    pub raw_rmc: Option<RawSentence>,
    pub raw_gga: Option<RawSentence>,
    pub provider_enabled: bool,
}

impl Snapshot {
    /// Raw sentence of the given kind to send verbatim, if there is one.
    ///
    /// Requires the fix provider to be enabled and the sentence to be marked
    /// valid and not older than `max_age`.
    pub fn usable_raw(&self, kind: Kind, now: Instant, max_age: Duration) -> Option<&str> {
        if !self.provider_enabled {
            return None;
        }

        let raw = match kind {
            Kind::Rmc => self.raw_rmc.as_ref(),
            Kind::Gga => self.raw_gga.as_ref(),
        }?;

        if raw.valid && now.saturating_duration_since(raw.observed_at) <= max_age {
            Some(&raw.text)
        } else {
            None
        }
    }
}


/// Latest-value store for location fixes and raw sentences.
///
/// Cloned handles share the same state: the host pushes updates through one,
/// the broadcaster reads through another.
#[derive(Debug, Clone)]
pub struct Feed {
    state: Arc<watch::Sender<Snapshot>>,
    max_age: Duration,
}

impl Feed {
    pub fn new() -> Self {
        Self::with_max_age(DEFAULT_RAW_MAX_AGE)
    }

    pub fn with_max_age(max_age: Duration) -> Self {
        let (tx, _) = watch::channel(Snapshot::default());

        Self {
            state: Arc::new(tx),
            max_age,
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn update_location(&self, sample: LocationSample) {
        self.state.send_modify(|s| s.location = Some(sample));
    }

    pub fn update_raw_rmc(&self, text: impl Into<String>, valid: bool) {
        let raw = Self::raw(text, valid);
        self.state.send_modify(|s| s.raw_rmc = Some(raw));
    }

    pub fn update_raw_gga(&self, text: impl Into<String>, valid: bool) {
        let raw = Self::raw(text, valid);
        self.state.send_modify(|s| s.raw_gga = Some(raw));
    }

    pub fn clear_raw(&self) {
        self.state.send_modify(|s| {
            s.raw_rmc = None;
            s.raw_gga = None;
        });
    }

    pub fn set_provider_enabled(&self, enabled: bool) {
        self.state.send_modify(|s| s.provider_enabled = enabled);
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    fn raw(text: impl Into<String>, valid: bool) -> RawSentence {
        RawSentence {
            text: text.into(),
            valid,
            observed_at: Instant::now(),
        }
    }
}

impl Default for Feed {
    fn default() -> Self {
        Self::new()
    }
}
