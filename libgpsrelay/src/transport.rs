//! Seam between the relay and the host's Bluetooth stack.

use std::future::Future;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Error;


/// Display name and stable address of a remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerInfo {
    pub name: String,
    pub address: String,
}

impl PeerInfo {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl std::fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}


/// RFCOMM channel to listen on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Any free channel, advertised via a service record under
    /// [`UUID`](crate::UUID) and [`SERVICE_NAME`](crate::SERVICE_NAME).
    #[default]
    Default,

    /// Exactly this channel. Not every stack supports every number.
    Fixed(u8),
}

impl Channel {
    pub fn from_raw(value: i64) -> Result<Self, Error> {
        match value {
            -1 => Ok(Channel::Default),
            0..=255 => Ok(Channel::Fixed(value as u8)),
            _ => Err(Error::InvalidChannel(value)),
        }
    }

    pub fn to_raw(&self) -> i64 {
        match self {
            Channel::Default => -1,
            Channel::Fixed(n) => *n as i64,
        }
    }
}

impl TryFrom<i32> for Channel {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::from_raw(value as i64)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Default => write!(f, "default"),
            Channel::Fixed(n) => write!(f, "{n}"),
        }
    }
}


/// A local Bluetooth adapter able to provide SPP links.
pub trait Adapter: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;
    type Acceptor: Acceptor<Stream = Self::Stream>;

    /// Bind a server endpoint on the given channel.
    ///
    /// Fails if the stack cannot provide the requested channel.
    fn listen(&self, channel: Channel) -> impl Future<Output = io::Result<Self::Acceptor>> + Send;

    /// Peers this adapter has been paired (bonded) with.
    fn paired_peers(&self) -> impl Future<Output = io::Result<Vec<PeerInfo>>> + Send;

    /// Open one outbound SPP link to the given peer.
    fn connect(&self, peer: &PeerInfo) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// A bound server endpoint. Dropping it closes the endpoint.
pub trait Acceptor: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    fn accept(&mut self) -> impl Future<Output = io::Result<(PeerInfo, Self::Stream)>> + Send;
}
