//! NMEA 0183 sentence encoding.

mod checksum;
mod encoder;

pub use checksum::{verify, Checksum};
pub use encoder::{encode_gga, encode_rmc, format_latitude, format_longitude};


/// Sentence types sent by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Recommended minimum: time, position, speed, bearing, date.
    Rmc,

    /// Fix data: time, position, fix quality, satellites, altitude.
    Gga,
}

impl Kind {
    pub fn id(&self) -> &'static str {
        match self {
            Kind::Rmc => "GPRMC",
            Kind::Gga => "GPGGA",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}
