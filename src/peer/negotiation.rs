//! Negotiation engine: turns inbound signaling envelopes into peer connection
//! operations.
//!
//! Flow (viewer is always the answerer):
//! 1. Remote sends `offer` -> peer connection is created on demand
//! 2. Offer applied as remote description, answer created and applied locally
//! 3. `answer` sent back over the signaling link
//! 4. Remote candidates are added as they arrive; candidates that precede the
//!    first offer have no peer connection to go to and are dropped

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::SessionError;
use crate::event::EventSender;
use crate::peer::{PeerConnection, PeerFactory, PeerSettings};
use crate::signaling::{IceCandidate, SessionDescription, SignalingEnvelope, SignalingLink};
use crate::state::StateEvent;

/// Message used when the remote `error` envelope carries none
pub const DEFAULT_REMOTE_ERROR: &str = "Server error";

/// Holder of a session's peer connection.
///
/// Once released, nothing can be installed again: a peer created by a
/// negotiation step that finishes after teardown is refused and closed.
#[derive(Clone, Default)]
pub struct PeerSlot {
    inner: Arc<Mutex<SlotState>>,
}

#[derive(Default)]
struct SlotState {
    peer: Option<Arc<dyn PeerConnection>>,
    released: bool,
}

impl PeerSlot {
    pub fn get(&self) -> Option<Arc<dyn PeerConnection>> {
        self.inner.lock().peer.clone()
    }

    /// Install `peer`; returns false if the slot was already released.
    pub fn install(&self, peer: Arc<dyn PeerConnection>) -> bool {
        let mut inner = self.inner.lock();
        if inner.released {
            return false;
        }
        inner.peer = Some(peer);
        true
    }

    /// Take the peer out and refuse further installs.
    pub fn release(&self) -> Option<Arc<dyn PeerConnection>> {
        let mut inner = self.inner.lock();
        inner.released = true;
        inner.peer.take()
    }
}

/// Drives offer/answer/candidate handling for one session
pub struct NegotiationEngine {
    factory: Arc<dyn PeerFactory>,
    settings: PeerSettings,
    slot: PeerSlot,
    events: EventSender,
}

impl NegotiationEngine {
    pub fn new(factory: Arc<dyn PeerFactory>, settings: PeerSettings, slot: PeerSlot, events: EventSender) -> Self {
        Self {
            factory,
            settings,
            slot,
            events,
        }
    }

    pub fn slot(&self) -> &PeerSlot {
        &self.slot
    }

    /// Handle one inbound envelope.
    ///
    /// Returns the state event the envelope implies, if any. Errors are
    /// negotiation failures; the caller turns them into the `failed` state.
    pub async fn handle(
        &self,
        envelope: SignalingEnvelope,
        link: &dyn SignalingLink,
    ) -> Result<Option<StateEvent>, SessionError> {
        match envelope {
            SignalingEnvelope::Offer { offer } => {
                self.handle_offer(offer, link).await?;
                Ok(None)
            }
            SignalingEnvelope::IceCandidate { candidate } => {
                self.handle_remote_candidate(candidate).await?;
                Ok(None)
            }
            SignalingEnvelope::Error { message } => {
                let message = message.unwrap_or_else(|| DEFAULT_REMOTE_ERROR.to_string());
                log::error!("[Negotiation] Remote reported error: {}", message);
                Ok(Some(StateEvent::RemoteError(message)))
            }
            other @ (SignalingEnvelope::Answer { .. } | SignalingEnvelope::RequestStream) => {
                // We are the answerer; these never arrive in this direction
                log::debug!("[Negotiation] Ignoring inbound '{}'", other.tag());
                Ok(None)
            }
        }
    }

    async fn handle_offer(&self, offer: SessionDescription, link: &dyn SignalingLink) -> Result<(), SessionError> {
        log::info!("[Negotiation] Received offer");

        let Some(peer) = self.ensure_peer().await? else {
            return Ok(());
        };

        peer.set_remote_description(offer).await?;
        let answer = peer.create_answer().await?;
        peer.set_local_description(answer.clone()).await?;

        if link.is_open() {
            link.send(&SignalingEnvelope::Answer { answer })?;
            log::info!("[Negotiation] Sent answer");
        } else {
            log::warn!("[Negotiation] Signaling link closed before the answer could be sent");
        }
        Ok(())
    }

    async fn handle_remote_candidate(&self, candidate: IceCandidate) -> Result<(), SessionError> {
        match self.slot.get() {
            Some(peer) => peer.add_ice_candidate(candidate).await,
            None => {
                log::debug!("[Negotiation] Dropping ICE candidate received before any offer");
                Ok(())
            }
        }
    }

    /// The session's peer, created on first use. `None` if the session was
    /// torn down while the peer was being created.
    async fn ensure_peer(&self) -> Result<Option<Arc<dyn PeerConnection>>, SessionError> {
        if let Some(peer) = self.slot.get() {
            return Ok(Some(peer));
        }

        let peer = self.factory.create(&self.settings, self.events.clone()).await?;
        if self.slot.install(peer.clone()) {
            return Ok(Some(peer));
        }

        log::debug!("[Negotiation] Session released during peer creation, closing new peer");
        if let Err(e) = peer.close().await {
            log::warn!("[Negotiation] {}", e);
        }
        Ok(None)
    }
}
