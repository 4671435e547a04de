//! Events funneled into a session's dispatch loop.
//!
//! The signaling transport and the peer connection both report through one
//! channel per session, so the dispatch task sees a single ordered stream.

use tokio::sync::mpsc;

use crate::signaling::IceCandidate;
use crate::stream::RemoteStream;

/// Signaling transport events (after the transport has opened)
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Raw text frame
    Message(String),
    /// Closed, gracefully or not
    Closed,
    /// Runtime failure of the transport
    Error(String),
}

/// Peer connection level connectivity signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectivity {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Native peer connection events
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// Local ICE candidate gathered during negotiation
    LocalCandidate(IceCandidate),
    /// Inbound media arrived; carries the stream with all tracks so far
    Track(RemoteStream),
    Connectivity(PeerConnectivity),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Transport(TransportEvent),
    Peer(PeerEvent),
}

impl From<TransportEvent> for SessionEvent {
    fn from(event: TransportEvent) -> Self {
        SessionEvent::Transport(event)
    }
}

impl From<PeerEvent> for SessionEvent {
    fn from(event: PeerEvent) -> Self {
        SessionEvent::Peer(event)
    }
}

/// Producer side of a session's event channel
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Consumer side of a session's event channel
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;
