//! One-shot outbound connections.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::registry::Registry;
use crate::session::Session;
use crate::transport::{Adapter, PeerInfo};


pub struct Dialer<A> {
    adapter: Arc<A>,
    registry: Arc<Registry>,
}

impl<A: Adapter> Dialer<A> {
    pub fn new(adapter: Arc<A>, registry: Arc<Registry>) -> Self {
        Self { adapter, registry }
    }

    /// Start a single connection attempt to a paired peer.
    ///
    /// Addresses that do not belong to a paired peer are ignored. Failed
    /// attempts are logged and dropped, there is no retry. Returns the
    /// attempt's task if one was started.
    pub async fn connect(&self, address: &str) -> Option<JoinHandle<()>> {
        let peers = match self.adapter.paired_peers().await {
            Ok(peers) => peers,
            Err(e) => {
                tracing::error!(%address, error=%e, "unable to list paired peers");
                return None;
            },
        };

        let Some(peer) = peers.into_iter().find(|p| p.address.eq_ignore_ascii_case(address)) else {
            tracing::debug!(%address, "not a paired peer, ignoring connection request");
            return None;
        };

        let task = tokio::spawn(attempt(self.adapter.clone(), self.registry.clone(), peer));
        Some(task)
    }
}


async fn attempt<A: Adapter>(adapter: Arc<A>, registry: Arc<Registry>, peer: PeerInfo) {
    tracing::debug!(%peer, "connecting");
    registry.dial_started().await;

    match adapter.connect(&peer).await {
        Ok(stream) => {
            Session::spawn(&registry, peer, stream).await;
        },
        Err(e) => {
            tracing::error!(%peer, error=%e, "connection attempt failed");
        },
    }

    registry.dial_finished().await;
}
