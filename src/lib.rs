//! webrtc-viewer - live WebRTC stream viewer session
//!
//! Connects to a WebSocket signaling server, asks the remote peer for a
//! stream, answers its offer and tracks the resulting connection.
//!
//! Features:
//! - WebSocket signaling (`request-stream` / offer / answer / trickled ICE)
//! - Lazy peer connection creation on the first offer (webrtc-rs)
//! - Single authoritative connection state (`disconnected | connecting | connected | failed`)
//!   with last error message and received remote stream, published via `tokio::sync::watch`
//! - Idempotent teardown; reconnecting never leaves two live signaling/peer pairs
//!
//! ```no_run
//! use webrtc_viewer::{ConnectionConfig, ViewerSession};
//!
//! # async fn run() -> Result<(), webrtc_viewer::SessionError> {
//! let mut session = ViewerSession::new(ConnectionConfig::new("ws://127.0.0.1:8080/viewer"));
//! let mut updates = session.subscribe();
//! session.connect().await?;
//! while updates.changed().await.is_ok() {
//!     let snapshot = updates.borrow_and_update().clone();
//!     println!("{:?} {}", snapshot.state, snapshot.error);
//! }
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod config;
pub mod error;
pub mod event;
pub mod ice;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod state;
pub mod stream;

pub use access::{SessionValidity, TokenPresence};
pub use config::{ConnectionConfig, MediaConstraints};
pub use error::SessionError;
pub use event::{PeerConnectivity, PeerEvent, SessionEvent, TransportEvent};
pub use ice::{default_ice_servers, IceServerConfig, DEFAULT_ICE_SERVERS};
pub use peer::{PeerConnection, PeerFactory, PeerSettings, RtcPeerFactory};
pub use session::ViewerSession;
pub use signaling::{
    IceCandidate, SdpKind, SessionDescription,
    SignalingConnector, SignalingEnvelope, SignalingLink, WsConnector,
};
pub use state::{ConnectionSnapshot, ConnectionState, StateEvent};
pub use stream::{MediaKind, RemoteStream, RemoteTrack};
