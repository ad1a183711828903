//! A single connected peer.

use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use futures::lock::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{BytesCodec, FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use crate::event::Event;
use crate::registry::Registry;
use crate::transport::PeerInfo;


pub type SessionId = u64;

/// Upper bound for a single write to one peer.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

type Writer = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, BytesCodec>;


/// One established link to a peer.
///
/// Data is only ever written to the peer. The read side is monitored solely
/// to detect when the peer goes away; anything received is discarded.
pub struct Session {
    id: SessionId,
    peer: PeerInfo,
    writer: Mutex<Option<Writer>>,
    cancel: CancellationToken,
    registry: Weak<Registry>,
}

impl Session {
    /// Take over an established link, register it, and start monitoring it.
    ///
    /// Returns `None` if the registry is stopped. The link is closed in that
    /// case.
    pub async fn spawn<S>(registry: &Arc<Registry>, peer: PeerInfo, stream: S) -> Option<Arc<Session>>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let writer: Box<dyn AsyncWrite + Send + Unpin> = Box::new(writer);

        let session = Arc::new(Session {
            id: registry.next_id(),
            peer,
            writer: Mutex::new(Some(FramedWrite::new(writer, BytesCodec::new()))),
            cancel: CancellationToken::new(),
            registry: Arc::downgrade(registry),
        });

        if !registry.insert(session.clone()).await {
            tracing::debug!(peer=%session.peer, "relay is stopped, discarding connection");
            session.close().await;
            return None;
        }

        tracing::info!(session=session.id, peer=%session.peer, "peer connected");

        let reader = FramedRead::new(reader, BytesCodec::new());
        tokio::spawn(session.clone().monitor(reader, registry.clone()));

        Some(session)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> &PeerInfo {
        &self.peer
    }

    /// Write and flush data, best-effort.
    ///
    /// Errors are logged and otherwise ignored. A failed write does not end
    /// the session; only the read side decides that.
    pub async fn write(&self, data: Bytes) {
        let mut writer = self.writer.lock().await;

        let Some(writer) = writer.as_mut() else {
            tracing::trace!(session=self.id, "session closed, dropping write");
            return;
        };

        match tokio::time::timeout(WRITE_TIMEOUT, writer.send(data)).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => {
                tracing::error!(session=self.id, peer=%self.peer, error=%e, "write failed");
            },
            Err(_) => {
                tracing::error!(session=self.id, peer=%self.peer, "write timed out");
            },
        }
    }

    /// Close the link and remove the session from the registry.
    ///
    /// Pending data is flushed for at most the write timeout. Does not report
    /// a disconnect to the host. Safe to call repeatedly.
    pub async fn cancel(&self) {
        self.cancel.cancel();
        self.close().await;

        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.id).await.is_some() {
                tracing::debug!(session=self.id, peer=%self.peer, "session cancelled");
            }
        }
    }

    async fn close(&self) {
        let writer = self.writer.lock().await.take();

        let Some(mut writer) = writer else {
            return;
        };

        // a peer that stopped reading must not keep the flush pending forever
        match tokio::time::timeout(WRITE_TIMEOUT, SinkExt::<Bytes>::close(&mut writer)).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => {
                tracing::warn!(session=self.id, peer=%self.peer, error=%e, "failed to close connection");
            },
            Err(_) => {
                tracing::warn!(session=self.id, peer=%self.peer, "close timed out, dropping connection");
            },
        }
    }

    async fn monitor<R>(self: Arc<Self>, mut reader: FramedRead<R, BytesCodec>, registry: Arc<Registry>)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let error = loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    return;
                },
                item = reader.next() => match item {
                    Some(Ok(data)) => {
                        tracing::trace!(session=self.id, len=data.len(), "discarding received data");
                    },
                    Some(Err(e)) => break Some(e),
                    None => break None,
                },
            }
        };

        match error {
            Some(e) => tracing::warn!(session=self.id, peer=%self.peer, error=%e, "connection lost"),
            None => tracing::info!(session=self.id, peer=%self.peer, "peer disconnected"),
        }

        drop(reader);
        self.close().await;

        registry.emit(Event::DeviceDisconnected(self.peer.clone()));
        registry.remove(self.id).await;
    }
}
