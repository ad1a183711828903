use num_enum::{FromPrimitive, IntoPrimitive};


/// Aggregate connection state of the relay.
///
/// This does not track individual sessions. It answers whether at least one
/// peer is connected, plus the listening and dialing transients.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, FromPrimitive)]
pub enum ConnectionState {
    /// Stopped. Inbound links are discarded.
    #[default]
    None = 0,

    /// Waiting for inbound links, no peer connected.
    Listening = 1,

    /// An outbound dial is in flight and no peer is connected yet.
    Connecting = 2,

    /// At least one peer is connected.
    Connected = 3,

    /// Not entered by the relay itself, kept for hosts mirroring the numeric
    /// state values.
    Disconnected = 4,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::None => "none",
            ConnectionState::Listening => "listening",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
