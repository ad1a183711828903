//! Relay the local position to paired serial-port-profile (SPP) peers as
//! NMEA 0183 sentences.
//!
//! The [`Relay`] listens for inbound links on an RFCOMM channel, dials
//! outbound links on request, and periodically fans out `$GPRMC`/`$GPGGA`
//! sentences built from the most recent fix in a [`Feed`] to every connected
//! peer. The Bluetooth stack itself is provided by the host through the
//! [`transport::Adapter`] trait; progress is reported back through an
//! [`event::Event`] channel.

use uuid::{uuid, Uuid};

/// UUID of the serial port profile, under which the relay is advertised.
///
/// Defined as `00001101-0000-1000-8000-00805f9b34fb`.
pub const UUID: Uuid = uuid!("00001101-0000-1000-8000-00805f9b34fb");

/// Name of the service record registered for the default channel.
pub const SERVICE_NAME: &str = "gpsrelay GPS";

pub mod broadcast;
pub mod config;
pub mod dialer;
pub mod error;
pub mod event;
pub mod listener;
pub mod location;
pub mod nmea;
pub mod registry;
pub mod relay;
pub mod session;
pub mod state;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::{Config, ForcedPeer};
pub use error::Error;
pub use event::{Event, EventSender};
pub use location::{Feed, FixSource, LocationSample};
pub use relay::Relay;
pub use state::ConnectionState;
pub use transport::{Channel, PeerInfo};
