//! Set of active sessions and the aggregate connection state.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::lock::Mutex;

use crate::event::{Event, EventSender};
use crate::session::{Session, SessionId};
use crate::state::ConnectionState;
use crate::transport::PeerInfo;


/// Sessions and connection state, guarded as one unit.
///
/// Every change of the session set or the state happens under the same lock,
/// so concurrent accept/dial completions and teardowns observe a consistent
/// view. State changes are reported to the host as they happen.
pub struct Registry {
    inner: Mutex<Inner>,
    events: EventSender,
    next_id: AtomicU64,
}

struct Inner {
    state: ConnectionState,
    sessions: HashMap<SessionId, Arc<Session>>,
    dialing: usize,
}

impl Inner {
    fn set_state(&mut self, state: ConnectionState, events: &EventSender) {
        if self.state == state {
            return;
        }

        tracing::debug!("state change: {} -> {}", self.state, state);

        self.state = state;
        events.emit(Event::StateChanged(state));
    }
}

impl Registry {
    pub fn new(events: EventSender) -> Self {
        let inner = Inner {
            state: ConnectionState::None,
            sessions: HashMap::new(),
            dialing: 0,
        };

        Self {
            inner: Mutex::new(inner),
            events,
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    pub async fn devices(&self) -> Vec<PeerInfo> {
        let inner = self.inner.lock().await;
        inner.sessions.values().map(|s| s.peer().clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Re-send the device list and the current state.
    pub async fn refresh(&self) {
        let inner = self.inner.lock().await;

        let devices = inner.sessions.values().map(|s| s.peer().clone()).collect();
        self.events.emit(Event::Devices(devices));
        self.events.emit(Event::StateChanged(inner.state));
    }

    /// Write to all sessions, best-effort.
    ///
    /// A no-op while stopped or without sessions. Failures are handled per
    /// session and never stop delivery to the others.
    pub async fn write(&self, data: Bytes) {
        let sessions = {
            let inner = self.inner.lock().await;

            if inner.state == ConnectionState::None {
                return;
            }

            inner.sessions.values().cloned().collect::<Vec<_>>()
        };

        if sessions.is_empty() {
            return;
        }

        futures::future::join_all(sessions.iter().map(|s| s.write(data.clone()))).await;
    }

    pub(crate) fn emit(&self, event: Event) {
        self.events.emit(event);
    }

    pub(crate) fn next_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Leave the stopped state.
    pub(crate) async fn start(&self) {
        let mut inner = self.inner.lock().await;

        if inner.state == ConnectionState::None {
            let state = if inner.sessions.is_empty() {
                ConnectionState::Listening
            } else {
                ConnectionState::Connected
            };

            inner.set_state(state, &self.events);
        }
    }

    /// Enter the stopped state and take all sessions out of the registry.
    ///
    /// The caller is responsible for cancelling the returned sessions.
    pub(crate) async fn stop(&self) -> Vec<Arc<Session>> {
        let mut inner = self.inner.lock().await;

        inner.set_state(ConnectionState::None, &self.events);
        inner.sessions.drain().map(|(_, s)| s).collect()
    }

    /// Add a freshly established session.
    ///
    /// Returns `false` if the relay is stopped, in which case the session has
    /// not been added and should be closed by the caller.
    pub(crate) async fn insert(&self, session: Arc<Session>) -> bool {
        let mut inner = self.inner.lock().await;

        if inner.state == ConnectionState::None {
            return false;
        }

        let peer = session.peer().clone();
        inner.sessions.insert(session.id(), session);

        self.events.emit(Event::DeviceConnected(peer));
        inner.set_state(ConnectionState::Connected, &self.events);
        true
    }

    /// Remove a session, falling back to listening if it was the last one.
    ///
    /// Returns `None` if the session had already been removed.
    pub(crate) async fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        let mut inner = self.inner.lock().await;

        let session = inner.sessions.remove(&id)?;

        if inner.sessions.is_empty() && inner.state == ConnectionState::Connected {
            inner.set_state(ConnectionState::Listening, &self.events);
        }

        Some(session)
    }

    pub(crate) async fn dial_started(&self) {
        let mut inner = self.inner.lock().await;

        inner.dialing += 1;

        if inner.state == ConnectionState::Listening {
            inner.set_state(ConnectionState::Connecting, &self.events);
        }
    }

    pub(crate) async fn dial_finished(&self) {
        let mut inner = self.inner.lock().await;

        inner.dialing = inner.dialing.saturating_sub(1);

        if inner.dialing == 0 && inner.state == ConnectionState::Connecting {
            inner.set_state(ConnectionState::Listening, &self.events);
        }
    }
}
