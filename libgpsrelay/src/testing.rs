//! In-memory transport for tests.

use std::collections::HashSet;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{duplex, AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::{mpsc, Mutex};

use crate::event::Event;
use crate::transport::{Acceptor, Adapter, Channel, PeerInfo};


const BUFFER_SIZE: usize = 64 * 1024;

type Incoming = io::Result<(PeerInfo, DuplexStream)>;


/// Route log output of the library through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

pub async fn recv_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}


/// A link that never delivers data and rejects every write.
pub struct FailingStream;

impl AsyncRead for FailingStream {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

impl AsyncWrite for FailingStream {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}


pub struct MockAdapter {
    incoming: Arc<Mutex<mpsc::UnboundedReceiver<Incoming>>>,
    dialed: mpsc::UnboundedSender<(PeerInfo, DuplexStream)>,
    paired: Vec<PeerInfo>,
    unreachable: HashSet<String>,
    listens: Arc<AtomicUsize>,
}

/// Test-side handle to a [`MockAdapter`].
pub struct MockRemote {
    incoming: mpsc::UnboundedSender<Incoming>,
    pub dialed: mpsc::UnboundedReceiver<(PeerInfo, DuplexStream)>,
    listens: Arc<AtomicUsize>,
}

impl MockAdapter {
    pub fn new(paired: Vec<PeerInfo>) -> (MockAdapter, MockRemote) {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let (dialed_tx, dialed_rx) = mpsc::unbounded_channel();
        let listens = Arc::new(AtomicUsize::new(0));

        let adapter = MockAdapter {
            incoming: Arc::new(Mutex::new(incoming_rx)),
            dialed: dialed_tx,
            paired,
            unreachable: HashSet::new(),
            listens: listens.clone(),
        };

        let remote = MockRemote {
            incoming: incoming_tx,
            dialed: dialed_rx,
            listens,
        };

        (adapter, remote)
    }

    pub fn unreachable(mut self, address: &str) -> Self {
        self.unreachable.insert(address.to_string());
        self
    }
}

impl MockRemote {
    /// Open an inbound link as the given peer, returning the peer's end.
    pub fn connect(&self, peer: PeerInfo) -> DuplexStream {
        self.connect_with_buffer(peer, BUFFER_SIZE)
    }

    /// Like [`MockRemote::connect`], with a link buffering at most `size` bytes.
    pub fn connect_with_buffer(&self, peer: PeerInfo, size: usize) -> DuplexStream {
        let (local, remote) = duplex(size);
        let _ = self.incoming.send(Ok((peer, local)));
        remote
    }

    /// Make the pending or next accept fail.
    pub fn fail_accept(&self) {
        let _ = self.incoming.send(Err(io::ErrorKind::ConnectionAborted.into()));
    }

    /// Number of endpoints bound so far.
    pub fn listens(&self) -> usize {
        self.listens.load(Ordering::SeqCst)
    }
}

impl Adapter for MockAdapter {
    type Stream = DuplexStream;
    type Acceptor = MockAcceptor;

    async fn listen(&self, channel: Channel) -> io::Result<MockAcceptor> {
        if let Channel::Fixed(n) = channel {
            if n == 0 || n > 30 {
                return Err(io::Error::new(io::ErrorKind::Unsupported, "unsupported channel"));
            }
        }

        self.listens.fetch_add(1, Ordering::SeqCst);
        Ok(MockAcceptor { incoming: self.incoming.clone() })
    }

    async fn paired_peers(&self) -> io::Result<Vec<PeerInfo>> {
        Ok(self.paired.clone())
    }

    async fn connect(&self, peer: &PeerInfo) -> io::Result<DuplexStream> {
        if self.unreachable.contains(&peer.address) {
            return Err(io::ErrorKind::HostUnreachable.into());
        }

        let (local, remote) = duplex(BUFFER_SIZE);
        let _ = self.dialed.send((peer.clone(), remote));
        Ok(local)
    }
}


pub struct MockAcceptor {
    incoming: Arc<Mutex<mpsc::UnboundedReceiver<Incoming>>>,
}

impl Acceptor for MockAcceptor {
    type Stream = DuplexStream;

    async fn accept(&mut self) -> io::Result<(PeerInfo, DuplexStream)> {
        let mut incoming = self.incoming.lock().await;

        match incoming.recv().await {
            Some(link) => link,
            None => Err(io::ErrorKind::BrokenPipe.into()),
        }
    }
}
