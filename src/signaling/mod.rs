//! Signaling for WebRTC connection establishment.
//!
//! - `envelope`: the JSON messages exchanged with the signaling server
//! - `transport`: the WebSocket link that carries them

pub mod envelope;
pub mod transport;

pub use envelope::*;
pub use transport::*;
