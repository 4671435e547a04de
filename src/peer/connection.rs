//! Peer connection seam and the webrtc-rs implementation.
//!
//! The negotiation engine only talks to [`PeerConnection`]; [`RtcPeerFactory`]
//! wraps RTCPeerConnection from webrtc-rs and turns its callbacks into
//! [`PeerEvent`]s on the session's event channel.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

use crate::config::{ConnectionConfig, MediaConstraints};
use crate::error::SessionError;
use crate::event::{EventSender, PeerConnectivity, PeerEvent};
use crate::ice::IceServerConfig;
use crate::signaling::{IceCandidate, SdpKind, SessionDescription};
use crate::stream::{MediaKind, RemoteStream, RemoteTrack};

/// What a peer connection is built from
#[derive(Clone, Debug, PartialEq)]
pub struct PeerSettings {
    pub ice_servers: Vec<IceServerConfig>,
    pub constraints: MediaConstraints,
}

impl From<&ConnectionConfig> for PeerSettings {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            ice_servers: config.effective_ice_servers(),
            constraints: config.effective_constraints(),
        }
    }
}

/// One negotiated peer connection
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn set_remote_description(&self, description: SessionDescription) -> Result<(), SessionError>;

    async fn create_answer(&self) -> Result<SessionDescription, SessionError>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), SessionError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), SessionError>;

    async fn close(&self) -> Result<(), SessionError>;
}

/// Creates peer connections wired to a session's event channel
#[async_trait]
pub trait PeerFactory: Send + Sync {
    async fn create(
        &self,
        settings: &PeerSettings,
        events: EventSender,
    ) -> Result<Arc<dyn PeerConnection>, SessionError>;
}

/// webrtc-rs backed [`PeerFactory`]
#[derive(Debug, Default, Clone, Copy)]
pub struct RtcPeerFactory;

#[async_trait]
impl PeerFactory for RtcPeerFactory {
    async fn create(
        &self,
        settings: &PeerSettings,
        events: EventSender,
    ) -> Result<Arc<dyn PeerConnection>, SessionError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| SessionError::Negotiation(format!("Failed to register codecs: {}", e)))?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)
            .map_err(|e| SessionError::Negotiation(format!("Failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: settings.ice_servers.iter().map(|s| s.to_rtc_ice_server()).collect(),
            ..Default::default()
        };

        let peer_connection = api
            .new_peer_connection(rtc_config)
            .await
            .map_err(|e| SessionError::Negotiation(format!("Failed to create peer connection: {}", e)))?;
        let peer_connection = Arc::new(peer_connection);

        let events_for_ice = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let events = events_for_ice.clone();
            Box::pin(async move {
                // None marks the end of gathering
                let Some(c) = candidate else { return };
                match c.to_json() {
                    Ok(init) => {
                        let _ = events.send(PeerEvent::LocalCandidate(from_rtc_candidate(init)).into());
                    }
                    Err(e) => log::warn!("[RtcPeer] Failed to serialize local ICE candidate: {}", e),
                }
            })
        }));

        let events_for_state = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            log::info!("[RtcPeer] Connection state: {:?}", state);
            let _ = events_for_state.send(PeerEvent::Connectivity(map_connectivity(state)).into());
            Box::pin(async {})
        }));

        // Tracks sharing a stream id accumulate into one RemoteStream
        let streams: Arc<Mutex<Option<RemoteStream>>> = Arc::new(Mutex::new(None));
        let constraints = settings.constraints;
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>, _receiver: Arc<RTCRtpReceiver>, _transceiver: Arc<RTCRtpTransceiver>| {
                let Some(kind) = MediaKind::from_codec_type(track.kind()) else {
                    return Box::pin(async {});
                };
                if !accepts(constraints, kind) {
                    log::debug!("[RtcPeer] Ignoring {:?} track {} (disabled by constraints)", kind, track.id());
                    return Box::pin(async {});
                }

                let stream_id = track.stream_id();
                let stream = {
                    let mut current = streams.lock();
                    let stream = match current.take() {
                        Some(existing) if existing.id() == stream_id => existing,
                        _ => RemoteStream::new(&stream_id),
                    };
                    let stream = stream.with_track(RemoteTrack::from_remote(track, kind));
                    *current = Some(stream.clone());
                    stream
                };

                log::info!("[RtcPeer] Remote {:?} track on stream '{}'", kind, stream.id());
                let _ = events.send(PeerEvent::Track(stream).into());
                Box::pin(async {})
            },
        ));

        Ok(Arc::new(RtcPeer { peer_connection }))
    }
}

/// webrtc-rs peer connection
pub struct RtcPeer {
    peer_connection: Arc<RTCPeerConnection>,
}

#[async_trait]
impl PeerConnection for RtcPeer {
    async fn set_remote_description(&self, description: SessionDescription) -> Result<(), SessionError> {
        let description = to_rtc_description(description)?;
        self.peer_connection
            .set_remote_description(description)
            .await
            .map_err(|e| SessionError::Negotiation(format!("Failed to set remote description: {}", e)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, SessionError> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|e| SessionError::Negotiation(format!("Failed to create answer: {}", e)))?;
        from_rtc_description(answer)
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), SessionError> {
        let description = to_rtc_description(description)?;
        self.peer_connection
            .set_local_description(description)
            .await
            .map_err(|e| SessionError::Negotiation(format!("Failed to set local description: {}", e)))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), SessionError> {
        let candidate_init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: candidate.username_fragment,
        };

        self.peer_connection
            .add_ice_candidate(candidate_init)
            .await
            .map_err(|e| SessionError::Negotiation(format!("Failed to add ICE candidate: {}", e)))
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.peer_connection
            .close()
            .await
            .map_err(|e| SessionError::Negotiation(format!("Failed to close peer connection: {}", e)))
    }
}

fn accepts(constraints: MediaConstraints, kind: MediaKind) -> bool {
    match kind {
        MediaKind::Audio => constraints.audio,
        MediaKind::Video => constraints.video,
    }
}

fn map_connectivity(state: RTCPeerConnectionState) -> PeerConnectivity {
    match state {
        RTCPeerConnectionState::Connecting => PeerConnectivity::Connecting,
        RTCPeerConnectionState::Connected => PeerConnectivity::Connected,
        RTCPeerConnectionState::Disconnected => PeerConnectivity::Disconnected,
        RTCPeerConnectionState::Failed => PeerConnectivity::Failed,
        RTCPeerConnectionState::Closed => PeerConnectivity::Closed,
        _ => PeerConnectivity::New,
    }
}

fn to_rtc_description(description: SessionDescription) -> Result<RTCSessionDescription, SessionError> {
    let parsed = match description.kind {
        SdpKind::Offer => RTCSessionDescription::offer(description.sdp),
        SdpKind::Answer => RTCSessionDescription::answer(description.sdp),
        SdpKind::Pranswer => RTCSessionDescription::pranswer(description.sdp),
        SdpKind::Rollback => {
            return Err(SessionError::Negotiation("Rollback descriptions are not supported".into()))
        }
    };
    parsed.map_err(|e| SessionError::Negotiation(format!("Invalid {:?} SDP: {}", description.kind, e)))
}

fn from_rtc_description(description: RTCSessionDescription) -> Result<SessionDescription, SessionError> {
    let kind = match description.sdp_type {
        RTCSdpType::Offer => SdpKind::Offer,
        RTCSdpType::Answer => SdpKind::Answer,
        RTCSdpType::Pranswer => SdpKind::Pranswer,
        RTCSdpType::Rollback => SdpKind::Rollback,
        other => {
            return Err(SessionError::Negotiation(format!("Unexpected SDP type: {:?}", other)))
        }
    };
    Ok(SessionDescription {
        kind,
        sdp: description.sdp,
    })
}

fn from_rtc_candidate(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraints_filter_track_kinds() {
        let audio_only = MediaConstraints { audio: true, video: false };
        assert!(accepts(audio_only, MediaKind::Audio));
        assert!(!accepts(audio_only, MediaKind::Video));
        assert!(accepts(MediaConstraints::default(), MediaKind::Video));
    }

    #[test]
    fn test_connectivity_mapping() {
        assert_eq!(map_connectivity(RTCPeerConnectionState::Connected), PeerConnectivity::Connected);
        assert_eq!(map_connectivity(RTCPeerConnectionState::Closed), PeerConnectivity::Closed);
        assert_eq!(map_connectivity(RTCPeerConnectionState::Failed), PeerConnectivity::Failed);
        assert_eq!(map_connectivity(RTCPeerConnectionState::Unspecified), PeerConnectivity::New);
    }

    #[test]
    fn test_invalid_sdp_is_negotiation_error() {
        let err = to_rtc_description(SessionDescription::offer("garbage")).unwrap_err();
        assert!(matches!(err, SessionError::Negotiation(_)));

        let err = to_rtc_description(SessionDescription {
            kind: SdpKind::Rollback,
            sdp: String::new(),
        })
        .unwrap_err();
        assert!(err.to_string().contains("Rollback"));
    }

    #[test]
    fn test_settings_from_config() {
        let config = ConnectionConfig::new("ws://localhost:8080")
            .with_ice_servers(vec![IceServerConfig::stun("stun:stun.example.org")])
            .with_constraints(MediaConstraints { audio: false, video: true });
        let settings = PeerSettings::from(&config);
        assert_eq!(settings.ice_servers.len(), 1);
        assert!(!settings.constraints.audio);
    }

    #[tokio::test]
    async fn test_rtc_peer_creates_and_closes() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let settings = PeerSettings {
            ice_servers: vec![],
            constraints: MediaConstraints::default(),
        };
        let peer = RtcPeerFactory.create(&settings, tx).await.unwrap();
        peer.close().await.unwrap();
    }
}
