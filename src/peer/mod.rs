//! Peer connection management for WebRTC.
//!
//! Handles the RTCPeerConnection seam and offer/answer negotiation.

pub mod connection;
pub mod negotiation;

pub use connection::*;
pub use negotiation::*;
