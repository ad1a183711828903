use std::io;

use bluer::{Address, Session};
use bluer::rfcomm::{self, Profile, ProfileHandle, ReqError, Role, SocketAddr, Stream};

use futures::StreamExt;

use gpsrelay::transport::{Acceptor, Adapter, Channel};
use gpsrelay::PeerInfo;


/// Highest channel number RFCOMM can bind.
const MAX_CHANNEL: u8 = 30;


/// SPP transport on top of BlueZ.
pub struct BluezAdapter {
    session: Session,
    adapter: bluer::Adapter,
}

impl BluezAdapter {
    pub async fn new(session: Session) -> bluer::Result<Self> {
        let adapter = session.default_adapter().await?;

        if !adapter.is_powered().await? {
            tracing::warn!(adapter=%adapter.name(), "adapter is not powered");
        }

        Ok(Self { session, adapter })
    }

    pub fn name(&self) -> &str {
        self.adapter.name()
    }

    async fn register(&self, role: Role) -> io::Result<ProfileHandle> {
        let profile = Profile {
            uuid: gpsrelay::UUID,
            name: Some(gpsrelay::SERVICE_NAME.to_string()),
            role: Some(role),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };

        tracing::debug!(?role, "registering SPP profile");
        self.session.register_profile(profile).await.map_err(io::Error::other)
    }
}

impl Adapter for BluezAdapter {
    type Stream = Stream;
    type Acceptor = BluezAcceptor;

    async fn listen(&self, channel: Channel) -> io::Result<BluezAcceptor> {
        match channel {
            Channel::Default => {
                let handle = self.register(Role::Server).await?;
                Ok(BluezAcceptor::Profile { adapter: self.adapter.clone(), handle })
            },
            Channel::Fixed(n) if (1..=MAX_CHANNEL).contains(&n) => {
                let listener = rfcomm::Listener::bind(SocketAddr::new(Address::any(), n)).await?;
                Ok(BluezAcceptor::Socket { adapter: self.adapter.clone(), listener })
            },
            Channel::Fixed(n) => {
                Err(io::Error::new(io::ErrorKind::Unsupported, format!("cannot bind RFCOMM channel {n}")))
            },
        }
    }

    async fn paired_peers(&self) -> io::Result<Vec<PeerInfo>> {
        let mut peers = Vec::new();

        for address in self.adapter.device_addresses().await.map_err(io::Error::other)? {
            let dev = self.adapter.device(address).map_err(io::Error::other)?;

            if !dev.is_paired().await.map_err(io::Error::other)? {
                continue;
            }

            peers.push(peer_info(&self.adapter, address).await);
        }

        Ok(peers)
    }

    async fn connect(&self, peer: &PeerInfo) -> io::Result<Stream> {
        let address: Address = peer.address.parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let dev = self.adapter.device(address).map_err(io::Error::other)?;
        let mut handle = self.register(Role::Client).await?;

        tracing::debug!(%address, "connecting to SPP profile");
        let stream = tokio::try_join!(
            async { dev.connect_profile(&gpsrelay::UUID).await.map_err(io::Error::other) },
            handle_requests_for_profile(&mut handle, address),
        )?.1;

        Ok(stream)
    }
}


/// A bound SPP endpoint: a registered service record or a plain socket.
pub enum BluezAcceptor {
    Profile {
        adapter: bluer::Adapter,
        handle: ProfileHandle,
    },
    Socket {
        adapter: bluer::Adapter,
        listener: rfcomm::Listener,
    },
}

impl Acceptor for BluezAcceptor {
    type Stream = Stream;

    async fn accept(&mut self) -> io::Result<(PeerInfo, Stream)> {
        match self {
            BluezAcceptor::Profile { adapter, handle } => {
                let Some(req) = handle.next().await else {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "profile unregistered"));
                };

                let address = req.device();
                tracing::debug!(%address, "received new profile connection request");

                let stream = req.accept().map_err(io::Error::other)?;
                Ok((peer_info(adapter, address).await, stream))
            },
            BluezAcceptor::Socket { adapter, listener } => {
                let (stream, sa) = listener.accept().await?;
                Ok((peer_info(adapter, sa.addr).await, stream))
            },
        }
    }
}


async fn handle_requests_for_profile(handle: &mut ProfileHandle, address: Address) -> io::Result<Stream> {
    while let Some(req) = handle.next().await {
        tracing::debug!(address=%req.device(), "received new profile connection request");

        if req.device() == address {
            tracing::debug!(address=%req.device(), "accepting profile connection request");
            return req.accept().map_err(io::Error::other);
        } else {
            req.reject(ReqError::Rejected);
        }
    }

    Err(io::Error::new(io::ErrorKind::ConnectionAborted, "profile terminated without requests"))
}

async fn peer_info(adapter: &bluer::Adapter, address: Address) -> PeerInfo {
    let alias = match adapter.device(address) {
        Ok(dev) => dev.alias().await.ok(),
        Err(_) => None,
    };

    let name = alias.unwrap_or_else(|| address.to_string());
    PeerInfo::new(name, address.to_string())
}
