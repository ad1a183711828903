//! Relay configuration, as persisted by the host.

use std::str::FromStr;
use std::time::Duration;

use crate::broadcast::DEFAULT_INTERVAL;
use crate::error::Error;
use crate::transport::Channel;


/// Peer to dial right after starting, if any.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum ForcedPeer {
    #[default]
    Disabled,
    Address(String),
}

impl FromStr for ForcedPeer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() || s.eq_ignore_ascii_case("disabled") {
            return Ok(ForcedPeer::Disabled);
        }

        if s.contains(char::is_whitespace) {
            return Err(Error::InvalidPeer(s.to_string()));
        }

        Ok(ForcedPeer::Address(s.to_string()))
    }
}

impl std::fmt::Display for ForcedPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForcedPeer::Disabled => write!(f, "disabled"),
            ForcedPeer::Address(address) => write!(f, "{address}"),
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub channel: Channel,
    pub update_interval: Duration,
    pub forced_peer: ForcedPeer,
}

impl Config {
    /// Build a configuration from its persisted form.
    ///
    /// `channel` is `-1` for the default service, `interval_ms` the broadcast
    /// period in milliseconds, `forced_peer` an address or `"disabled"`.
    pub fn from_raw(channel: i64, interval_ms: u64, forced_peer: &str) -> Result<Self, Error> {
        if interval_ms == 0 {
            return Err(Error::InvalidInterval);
        }

        Ok(Self {
            channel: Channel::from_raw(channel)?,
            update_interval: Duration::from_millis(interval_ms),
            forced_peer: forced_peer.parse()?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: Channel::Default,
            update_interval: DEFAULT_INTERVAL,
            forced_peer: ForcedPeer::Disabled,
        }
    }
}
