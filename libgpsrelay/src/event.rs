//! Notifications produced for the host.

use tokio::sync::mpsc;

use crate::location::FixSource;
use crate::state::ConnectionState;
use crate::transport::PeerInfo;


#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StateChanged(ConnectionState),
    DeviceConnected(PeerInfo),
    DeviceDisconnected(PeerInfo),
    Devices(Vec<PeerInfo>),
    Location {
        latitude: f64,
        longitude: f64,
        source: FixSource,
    },
}


/// Sending side of the event channel.
///
/// Events are pushed without blocking. The host drains the receiving side on
/// its own task; dropping the receiver silently discards further events.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }

    pub(crate) fn emit(&self, event: Event) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!(event=?e.0, "event receiver is gone, dropping event");
        }
    }
}

pub fn channel() -> (EventSender, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender::new(tx), rx)
}
