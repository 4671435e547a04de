//! Viewer session facade.
//!
//! A [`ViewerSession`] owns at most one signaling link and one peer connection
//! at a time. `connect()` always tears the previous pair down first, so a
//! facade can never hold two live pairs.
//!
//! Each session runs one dispatch task. Transport frames and peer callbacks
//! are queued on the same channel and handled strictly in arrival order; a
//! frame that arrives while an offer is being negotiated waits its turn.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::ConnectionConfig;
use crate::error::SessionError;
use crate::event::{EventReceiver, PeerConnectivity, PeerEvent, SessionEvent, TransportEvent};
use crate::peer::{NegotiationEngine, PeerFactory, PeerSettings, PeerSlot, RtcPeerFactory};
use crate::signaling::{SignalingConnector, SignalingEnvelope, SignalingLink, WsConnector};
use crate::state::{ConnectionSnapshot, ConnectionState, StateEvent, StateMachine};
use crate::stream::RemoteStream;

/// Resources of the currently active session
struct ActiveSession {
    link: Arc<dyn SignalingLink>,
    slot: PeerSlot,
    dispatcher: JoinHandle<()>,
    /// Set by the dispatch task once the session reached `disconnected` on its own
    ended: Arc<AtomicBool>,
}

/// Entry point for viewing a remote stream
pub struct ViewerSession {
    config: ConnectionConfig,
    connector: Arc<dyn SignalingConnector>,
    peers: Arc<dyn PeerFactory>,
    machine: Arc<StateMachine>,
    active: Option<ActiveSession>,
}

impl ViewerSession {
    /// Session using WebSocket signaling and webrtc-rs peers
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_components(config, Arc::new(WsConnector), Arc::new(RtcPeerFactory))
    }

    /// Session with a custom transport and peer implementation
    pub fn with_components(
        config: ConnectionConfig,
        connector: Arc<dyn SignalingConnector>,
        peers: Arc<dyn PeerFactory>,
    ) -> Self {
        Self {
            config,
            connector,
            peers,
            machine: Arc::new(StateMachine::new()),
            active: None,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.machine.snapshot().state
    }

    /// Last error message, empty if none
    pub fn error_message(&self) -> String {
        self.machine.snapshot().error
    }

    pub fn remote_stream(&self) -> Option<RemoteStream> {
        self.machine.snapshot().stream
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.machine.snapshot()
    }

    /// Watch state/error/stream changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.machine.subscribe()
    }

    /// Whether a signaling link/peer pair is currently held
    pub fn has_active_session(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.ended.load(Ordering::SeqCst))
    }

    /// Start a new session.
    ///
    /// Tears down any previous session, opens the signaling link and asks the
    /// remote side for a stream. Resolves once the link is open; negotiation
    /// continues in the background and is observed through [`subscribe`](Self::subscribe).
    ///
    /// Fails only if the link cannot be opened, in which case the state is
    /// also `failed` with the reason as error message.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        self.disconnect().await;
        let generation = self.machine.generation();

        let url = match self.config.parse_signaling_url() {
            Ok(url) => url,
            Err(e) => {
                log::error!("[ViewerSession] {}", e);
                self.machine.apply(generation, StateEvent::TransportError(e.to_string()));
                return Err(e);
            }
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel::<SessionEvent>();
        let link = match self.connector.open(&url, events_tx.clone()).await {
            Ok(link) => link,
            Err(e) => {
                log::error!("[ViewerSession] {}", e);
                self.machine.apply(generation, StateEvent::TransportError(e.to_string()));
                return Err(e);
            }
        };

        self.machine.apply(generation, StateEvent::TransportOpened);
        if let Err(e) = link.send(&SignalingEnvelope::RequestStream) {
            log::warn!("[ViewerSession] Failed to request stream: {}", e);
        }

        let slot = PeerSlot::default();
        let engine = NegotiationEngine::new(
            self.peers.clone(),
            PeerSettings::from(&self.config),
            slot.clone(),
            events_tx,
        );
        let ended = Arc::new(AtomicBool::new(false));
        let dispatch = Dispatch {
            generation,
            machine: self.machine.clone(),
            engine,
            link: link.clone(),
            slot: slot.clone(),
            ended: ended.clone(),
        };
        let dispatcher = tokio::spawn(dispatch.run(events_rx));

        self.active = Some(ActiveSession {
            link,
            slot,
            dispatcher,
            ended,
        });
        Ok(())
    }

    /// Close the peer connection and signaling link, clear the stream and
    /// reset to `disconnected`. Calling it again is a no-op.
    pub async fn disconnect(&mut self) {
        // Invalidate first so nothing from the old pair lands afterwards
        self.machine.begin();

        let Some(active) = self.active.take() else {
            return;
        };
        log::info!("[ViewerSession] Disconnecting");

        active.dispatcher.abort();
        if let Some(peer) = active.slot.release() {
            if let Err(e) = peer.close().await {
                log::warn!("[ViewerSession] {}", e);
            }
        }
        active.link.close();
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        self.machine.begin();
        active.dispatcher.abort();
        active.link.close();

        // Peer close is async; hand it to the runtime if there is one
        if let Some(peer) = active.slot.release() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = peer.close().await {
                            log::warn!("[ViewerSession] {}", e);
                        }
                    });
                }
                Err(_) => log::warn!("[ViewerSession] Dropped outside a runtime, peer connection not closed"),
            }
        }
    }
}

/// The per-session dispatch loop
struct Dispatch {
    generation: u64,
    machine: Arc<StateMachine>,
    engine: NegotiationEngine,
    link: Arc<dyn SignalingLink>,
    slot: PeerSlot,
    ended: Arc<AtomicBool>,
}

/// What the loop does after an event
enum Flow {
    Continue,
    /// Session reached `disconnected`; resources released
    Finished,
}

impl Dispatch {
    async fn run(self, mut events: EventReceiver) {
        while let Some(event) = events.recv().await {
            if !self.machine.is_current(self.generation) {
                break;
            }
            let flow = match event {
                SessionEvent::Transport(event) => self.on_transport(event).await,
                SessionEvent::Peer(event) => self.on_peer(event).await,
            };
            if let Flow::Finished = flow {
                break;
            }
        }
        log::debug!("[ViewerSession] Dispatch loop for session {} finished", self.generation);
    }

    async fn on_transport(&self, event: TransportEvent) -> Flow {
        match event {
            TransportEvent::Message(text) => {
                let envelope = match SignalingEnvelope::from_json(&text) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        log::warn!("[ViewerSession] Dropping signaling frame: {}", e);
                        return Flow::Continue;
                    }
                };
                log::debug!("[ViewerSession] Received '{}'", envelope.tag());

                match self.engine.handle(envelope, self.link.as_ref()).await {
                    Ok(Some(state_event)) => self.apply(state_event),
                    Ok(None) => {}
                    Err(e) => {
                        log::error!("[ViewerSession] Error processing signaling message: {}", e);
                        self.apply(StateEvent::NegotiationFailed(e.to_string()));
                    }
                }
                Flow::Continue
            }
            TransportEvent::Error(message) => {
                self.apply(StateEvent::TransportError(
                    SessionError::TransportRuntime(message).to_string(),
                ));
                Flow::Continue
            }
            TransportEvent::Closed => self.finish(StateEvent::TransportClosed).await,
        }
    }

    async fn on_peer(&self, event: PeerEvent) -> Flow {
        match event {
            PeerEvent::LocalCandidate(candidate) => {
                // Trickled candidates are best effort
                if self.link.is_open() {
                    if let Err(e) = self.link.send(&SignalingEnvelope::IceCandidate { candidate }) {
                        log::debug!("[ViewerSession] Local ICE candidate not sent: {}", e);
                    }
                } else {
                    log::debug!("[ViewerSession] Signaling link closed, dropping local ICE candidate");
                }
                Flow::Continue
            }
            PeerEvent::Track(stream) => {
                self.apply(StateEvent::TrackReceived(stream));
                Flow::Continue
            }
            PeerEvent::Connectivity(PeerConnectivity::Connected) => {
                self.apply(StateEvent::PeerConnected);
                Flow::Continue
            }
            PeerEvent::Connectivity(PeerConnectivity::Disconnected | PeerConnectivity::Closed) => {
                self.finish(StateEvent::PeerDisconnected).await
            }
            PeerEvent::Connectivity(PeerConnectivity::Failed) => {
                self.apply(StateEvent::PeerFailed);
                Flow::Continue
            }
            PeerEvent::Connectivity(PeerConnectivity::New | PeerConnectivity::Connecting) => Flow::Continue,
        }
    }

    fn apply(&self, event: StateEvent) {
        self.machine.apply(self.generation, event);
    }

    /// Enter `disconnected` through `event` and drop the session's pair.
    /// The stream goes with the peer that carried it.
    async fn finish(&self, event: StateEvent) -> Flow {
        self.machine.apply_all(self.generation, [event, StateEvent::SessionEnded]);
        self.ended.store(true, Ordering::SeqCst);

        if let Some(peer) = self.slot.release() {
            if let Err(e) = peer.close().await {
                log::warn!("[ViewerSession] {}", e);
            }
        }
        self.link.close();
        log::info!("[ViewerSession] Session ended, signaling link and peer connection released");
        Flow::Finished
    }
}
