//! Control surface tying listener, dialer, sessions and broadcaster together.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::lock::Mutex;

use crate::broadcast::Broadcaster;
use crate::config::{Config, ForcedPeer};
use crate::dialer::Dialer;
use crate::event::EventSender;
use crate::listener::Listener;
use crate::location::Feed;
use crate::registry::Registry;
use crate::state::ConnectionState;
use crate::transport::{Adapter, Channel, PeerInfo};


/// The relay service.
///
/// None of the operations fail: problems are logged and reported through the
/// event channel only. Call [`Relay::stop`] before dropping the relay to close
/// remaining sessions.
pub struct Relay<A> {
    adapter: Arc<A>,
    registry: Arc<Registry>,
    dialer: Dialer<A>,
    feed: Feed,
    control: Mutex<Control>,
}

#[derive(Default)]
struct Control {
    listener: Option<Listener>,
    broadcaster: Option<Broadcaster>,
}

impl<A: Adapter> Relay<A> {
    pub fn new(adapter: A, feed: Feed, events: EventSender) -> Self {
        let adapter = Arc::new(adapter);
        let registry = Arc::new(Registry::new(events));
        let dialer = Dialer::new(adapter.clone(), registry.clone());

        Self {
            adapter,
            registry,
            dialer,
            feed,
            control: Mutex::new(Control::default()),
        }
    }

    /// Start listening and (re)arm the broadcaster.
    ///
    /// The listener is recreated only if the channel changed or the previous
    /// one has ended. The broadcaster is always replaced; a zero interval
    /// selects the default.
    pub async fn start(&self, channel: Channel, interval: Duration) {
        let mut control = self.control.lock().await;

        tracing::debug!(%channel, interval_ms=interval.as_millis() as u64, "starting relay");

        self.registry.start().await;

        if let Some(listener) = control.listener.take_if(|l| l.channel() != channel || l.is_finished()) {
            tracing::debug!(channel=%listener.channel(), "replacing listener");
            listener.cancel();
        }

        if control.listener.is_none() {
            let listener = Listener::start(self.adapter.clone(), self.registry.clone(), channel);
            control.listener = Some(listener);
        }

        if let Some(broadcaster) = control.broadcaster.take() {
            broadcaster.cancel();
        }

        let broadcaster = Broadcaster::start(self.registry.clone(), self.feed.clone(), interval);
        control.broadcaster = Some(broadcaster);
    }

    /// Start with the given configuration and dial the forced peer, if any.
    pub async fn apply(&self, config: &Config) {
        self.start(config.channel, config.update_interval).await;

        if let ForcedPeer::Address(address) = &config.forced_peer {
            self.connect(address).await;
        }
    }

    /// Tear down listener, sessions and broadcaster.
    pub async fn stop(&self) {
        let mut control = self.control.lock().await;

        tracing::debug!("stopping relay");

        if let Some(listener) = control.listener.take() {
            listener.cancel();
        }

        if let Some(broadcaster) = control.broadcaster.take() {
            broadcaster.cancel();
        }

        let sessions = self.registry.stop().await;
        futures::future::join_all(sessions.iter().map(|s| s.cancel())).await;
    }

    /// Dial a paired peer once.
    pub async fn connect(&self, address: &str) {
        self.dialer.connect(address).await;
    }

    /// Write raw data to all connected peers.
    pub async fn write(&self, data: impl Into<Bytes>) {
        self.registry.write(data.into()).await;
    }

    /// Re-send the device list and current state to the host.
    pub async fn refresh(&self) {
        self.registry.refresh().await;
    }

    pub async fn state(&self) -> ConnectionState {
        self.registry.state().await
    }

    pub async fn devices(&self) -> Vec<PeerInfo> {
        self.registry.devices().await
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::event::{self, Event};
    use crate::location::{FixSource, LocationSample};
    use crate::nmea::verify;
    use crate::testing::{init_tracing, recv_event, MockAdapter, MockRemote};

    use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn radio() -> PeerInfo {
        PeerInfo::new("radio", "00:11:22:33:44:55")
    }

    fn handheld() -> PeerInfo {
        PeerInfo::new("handheld", "66:77:88:99:AA:BB")
    }

    fn sample() -> LocationSample {
        LocationSample {
            timestamp_ms: 1_700_000_000_123,
            latitude: 48.2082,
            longitude: 16.3738,
            altitude: 171.0,
            speed: 0.0,
            bearing: 0.0,
            accuracy: 5.0,
            satellites: Some(7),
            source: FixSource::Network,
        }
    }

    fn setup() -> (Relay<MockAdapter>, MockRemote, UnboundedReceiver<Event>) {
        init_tracing();

        let (adapter, remote) = MockAdapter::new(vec![handheld()]);
        let (events, rx) = event::channel();

        (Relay::new(adapter, Feed::new(), events), remote, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle() {
        let (relay, remote, mut rx) = setup();
        assert_eq!(relay.state().await, ConnectionState::None);

        relay.start(Channel::Default, Duration::from_secs(2)).await;
        assert_eq!(recv_event(&mut rx).await, Event::StateChanged(ConnectionState::Listening));

        let link = remote.connect(radio());
        assert_eq!(recv_event(&mut rx).await, Event::DeviceConnected(radio()));
        assert_eq!(recv_event(&mut rx).await, Event::StateChanged(ConnectionState::Connected));
        assert_eq!(relay.devices().await, vec![radio()]);

        // peer goes away
        drop(link);
        assert_eq!(recv_event(&mut rx).await, Event::DeviceDisconnected(radio()));
        assert_eq!(recv_event(&mut rx).await, Event::StateChanged(ConnectionState::Listening));
        assert!(relay.devices().await.is_empty());

        relay.stop().await;
        assert_eq!(recv_event(&mut rx).await, Event::StateChanged(ConnectionState::None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_closes_sessions() {
        let (relay, remote, mut rx) = setup();

        relay.start(Channel::Default, Duration::from_secs(2)).await;
        recv_event(&mut rx).await;

        let mut first = remote.connect(radio());
        let mut second = remote.connect(handheld());
        for _ in 0..3 {
            recv_event(&mut rx).await;
        }

        relay.stop().await;
        assert_eq!(recv_event(&mut rx).await, Event::StateChanged(ConnectionState::None));

        let mut buf = [0; 16];
        assert_eq!(first.read(&mut buf).await.unwrap(), 0);
        assert_eq!(second.read(&mut buf).await.unwrap(), 0);

        assert_eq!(relay.state().await, ConnectionState::None);
        assert!(relay.devices().await.is_empty());

        // no disconnect events for administrative teardown
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_with_stalled_peer() {
        let (relay, remote, mut rx) = setup();

        relay.start(Channel::Default, Duration::from_secs(60)).await;
        recv_event(&mut rx).await;

        // peer that never reads, with barely any buffer
        let _stalled = remote.connect_with_buffer(radio(), 8);
        let mut healthy = remote.connect(handheld());
        for _ in 0..3 {
            recv_event(&mut rx).await;
        }

        relay.write(vec![b'x'; 64]).await;

        let mut buf = [0; 64];
        healthy.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [b'x'; 64]);

        tokio::time::timeout(Duration::from_secs(60), relay.stop())
            .await
            .expect("stop did not complete");

        assert_eq!(recv_event(&mut rx).await, Event::StateChanged(ConnectionState::None));
        assert_eq!(healthy.read(&mut buf).await.unwrap(), 0);

        // the control lock has been released
        tokio::time::timeout(Duration::from_secs(60), relay.start(Channel::Default, Duration::from_secs(60)))
            .await
            .expect("start did not complete");

        assert_eq!(recv_event(&mut rx).await, Event::StateChanged(ConnectionState::Listening));
        assert!(relay.devices().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_to_all_sessions() {
        let (relay, remote, mut rx) = setup();

        relay.start(Channel::Default, Duration::from_secs(60)).await;
        recv_event(&mut rx).await;

        let first = remote.connect(radio());
        let second = remote.connect(handheld());
        for _ in 0..3 {
            recv_event(&mut rx).await;
        }

        // rearming ticks right away
        relay.feed().update_location(sample());
        relay.start(Channel::Default, Duration::from_secs(60)).await;

        for link in [first, second] {
            let mut link = BufReader::new(link);
            let mut rmc = String::new();
            let mut gga = String::new();

            link.read_line(&mut rmc).await.unwrap();
            link.read_line(&mut gga).await.unwrap();

            assert!(rmc.starts_with("$GPRMC,221320.123,A,4812.492,N,01622.428,E,"));
            assert!(gga.starts_with("$GPGGA,221320.123,4812.492,N,01622.428,E,1,07,"));
            assert!(verify(&rmc) && verify(&gga));
        }

        assert_eq!(remote.listens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_change_recreates_listener() {
        let (relay, remote, mut rx) = setup();

        relay.start(Channel::Default, Duration::from_secs(2)).await;
        relay.start(Channel::Default, Duration::from_secs(1)).await;
        assert_eq!(recv_event(&mut rx).await, Event::StateChanged(ConnectionState::Listening));

        let _first = remote.connect(radio());
        assert_eq!(recv_event(&mut rx).await, Event::DeviceConnected(radio()));
        assert_eq!(recv_event(&mut rx).await, Event::StateChanged(ConnectionState::Connected));
        assert_eq!(remote.listens(), 1);

        // existing sessions survive the switch
        relay.start(Channel::Fixed(5), Duration::from_secs(1)).await;
        let _second = remote.connect(handheld());
        assert_eq!(recv_event(&mut rx).await, Event::DeviceConnected(handheld()));
        assert_eq!(remote.listens(), 2);
        assert_eq!(relay.devices().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_listener_is_recreated() {
        let (relay, remote, mut rx) = setup();

        // unsupported channel, the relay still reports listening
        relay.start(Channel::Fixed(99), Duration::from_secs(2)).await;
        assert_eq!(recv_event(&mut rx).await, Event::StateChanged(ConnectionState::Listening));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(remote.listens(), 0);

        relay.start(Channel::Fixed(3), Duration::from_secs(2)).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(remote.listens(), 1);

        // same channel, but the accept loop has died in the meantime
        remote.fail_accept();
        tokio::time::sleep(Duration::from_millis(100)).await;

        relay.start(Channel::Fixed(3), Duration::from_secs(2)).await;
        let _link = remote.connect(radio());
        assert_eq!(recv_event(&mut rx).await, Event::DeviceConnected(radio()));
        assert_eq!(remote.listens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_dials_forced_peer() {
        let (relay, mut remote, mut rx) = setup();

        let config = Config::from_raw(-1, 2000, "66:77:88:99:aa:bb").unwrap();
        relay.apply(&config).await;

        assert_eq!(recv_event(&mut rx).await, Event::StateChanged(ConnectionState::Listening));
        assert_eq!(recv_event(&mut rx).await, Event::StateChanged(ConnectionState::Connecting));
        assert_eq!(recv_event(&mut rx).await, Event::DeviceConnected(handheld()));
        assert_eq!(recv_event(&mut rx).await, Event::StateChanged(ConnectionState::Connected));

        let (peer, _link) = remote.dialed.recv().await.unwrap();
        assert_eq!(peer, handheld());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_passthrough() {
        let (relay, remote, mut rx) = setup();

        // neither stopped nor empty relays complain
        relay.write(&b"ignored\r\n"[..]).await;
        relay.start(Channel::Default, Duration::from_secs(60)).await;
        relay.write(&b"ignored\r\n"[..]).await;
        recv_event(&mut rx).await;

        let link = remote.connect(radio());
        recv_event(&mut rx).await;
        recv_event(&mut rx).await;

        relay.write(&b"$PADMIN,1*00\r\n"[..]).await;

        let mut line = String::new();
        BufReader::new(link).read_line(&mut line).await.unwrap();
        assert_eq!(line, "$PADMIN,1*00\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh() {
        let (relay, remote, mut rx) = setup();

        relay.start(Channel::Default, Duration::from_secs(2)).await;
        recv_event(&mut rx).await;

        let _link = remote.connect(radio());
        recv_event(&mut rx).await;
        recv_event(&mut rx).await;

        relay.refresh().await;
        assert_eq!(recv_event(&mut rx).await, Event::Devices(vec![radio()]));
        assert_eq!(recv_event(&mut rx).await, Event::StateChanged(ConnectionState::Connected));
    }
}
