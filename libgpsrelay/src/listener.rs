//! Accepting inbound links.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::registry::Registry;
use crate::session::Session;
use crate::transport::{Acceptor, Adapter, Channel};


/// Accept loop bound to one channel.
///
/// Each accepted link becomes a [`Session`]. The loop ends for good on the
/// first accept error or if the channel cannot be bound; a new listener has
/// to be started to try again. Dropping the listener cancels it.
pub struct Listener {
    channel: Channel,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Listener {
    pub fn start<A: Adapter>(adapter: Arc<A>, registry: Arc<Registry>, channel: Channel) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(adapter, registry, channel, cancel.clone()));

        Self { channel, cancel, task }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Whether the accept loop has ended, by cancellation or failure.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the endpoint, aborting a pending accept.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}


async fn run<A: Adapter>(adapter: Arc<A>, registry: Arc<Registry>, channel: Channel, cancel: CancellationToken) {
    let bound = tokio::select! {
        biased;

        _ = cancel.cancelled() => return,
        res = adapter.listen(channel) => res,
    };

    let mut acceptor = match bound {
        Ok(acceptor) => acceptor,
        Err(e) => {
            tracing::error!(%channel, error=%e, "unable to listen on channel");
            return;
        },
    };

    tracing::debug!(%channel, "listening for connections");

    loop {
        let accepted = tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            res = acceptor.accept() => res,
        };

        match accepted {
            Ok((peer, stream)) => {
                tracing::debug!(%channel, %peer, "accepted connection");
                Session::spawn(&registry, peer, stream).await;
            },
            Err(e) => {
                tracing::error!(%channel, error=%e, "accept failed, listener terminated");
                break;
            },
        }
    }

    drop(acceptor);
    tracing::debug!(%channel, "listener stopped");
}
