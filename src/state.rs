//! Connection state machine.
//!
//! [`ConnectionSnapshot::reduce`] is the pure transition function.
//! [`StateMachine`] owns the only writer of the published snapshot and tags
//! every session with a generation, so events belonging to a torn-down session
//! can never overwrite the state of its successor.

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;

use crate::stream::RemoteStream;

/// Error text published when the peer connection reports `failed`
pub const PEER_FAILED_MESSAGE: &str = "WebRTC connection failed";

/// Viewer connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    TransportOpened,
    TransportClosed,
    TransportError(String),
    RemoteError(String),
    NegotiationFailed(String),
    PeerConnected,
    PeerDisconnected,
    PeerFailed,
    TrackReceived(RemoteStream),
    /// The session released its signaling link and peer connection
    SessionEnded,
}

/// Immutable view of `(state, error, stream)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    /// Last failure description; empty when there is none
    pub error: String,
    pub stream: Option<RemoteStream>,
}

impl ConnectionSnapshot {
    pub fn reduce(&self, event: StateEvent) -> Self {
        let mut next = self.clone();
        match event {
            StateEvent::TransportOpened => {
                next.state = ConnectionState::Connecting;
            }
            StateEvent::TransportClosed => {
                next.state = ConnectionState::Disconnected;
                next.error.clear();
                next.stream = None;
            }
            StateEvent::TransportError(message)
            | StateEvent::RemoteError(message)
            | StateEvent::NegotiationFailed(message) => {
                next.state = ConnectionState::Failed;
                next.error = message;
            }
            StateEvent::PeerConnected => {
                next.state = ConnectionState::Connected;
                next.error.clear();
            }
            StateEvent::PeerDisconnected => {
                next.state = ConnectionState::Disconnected;
            }
            StateEvent::PeerFailed => {
                next.state = ConnectionState::Failed;
                next.error = PEER_FAILED_MESSAGE.to_string();
            }
            StateEvent::TrackReceived(stream) => {
                next.state = ConnectionState::Connected;
                next.stream = Some(stream);
            }
            StateEvent::SessionEnded => {
                next.state = ConnectionState::Disconnected;
                next.stream = None;
            }
        }
        next
    }
}

/// Single writer of the published [`ConnectionSnapshot`]
pub struct StateMachine {
    generation: Mutex<u64>,
    tx: watch::Sender<ConnectionSnapshot>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionSnapshot::default());
        Self {
            generation: Mutex::new(0),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        *self.generation.lock() == generation
    }

    /// Invalidate the current session and reset to the disconnected snapshot.
    ///
    /// Returns the new generation. Subscribers are only notified when the
    /// published snapshot actually changes.
    pub fn begin(&self) -> u64 {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.tx.send_if_modified(|snapshot| {
            if *snapshot == ConnectionSnapshot::default() {
                false
            } else {
                *snapshot = ConnectionSnapshot::default();
                true
            }
        });
        *generation
    }

    /// Apply `event` if `generation` is still current. Returns whether it was applied.
    pub fn apply(&self, generation: u64, event: StateEvent) -> bool {
        self.apply_all(generation, [event])
    }

    /// Apply `events` in order and publish the result once.
    pub fn apply_all(&self, generation: u64, events: impl IntoIterator<Item = StateEvent>) -> bool {
        let current = self.generation.lock();
        if *current != generation {
            log::debug!("[StateMachine] Ignoring events from stale session {}", generation);
            return false;
        }
        self.tx.send_if_modified(|snapshot| {
            let next = events.into_iter().fold(snapshot.clone(), |acc, event| acc.reduce(event));
            if next == *snapshot {
                false
            } else {
                log::debug!("[StateMachine] {:?} -> {:?}", snapshot.state, next.state);
                *snapshot = next;
                true
            }
        });
        true
    }
}
