//! Signaling message types exchanged with the signaling server.
//!
//! Every frame is one JSON object tagged by `"type"`:
//!
//! ```json
//! {"type":"request-stream"}
//! {"type":"offer","offer":{"type":"offer","sdp":"v=0..."}}
//! {"type":"answer","answer":{"type":"answer","sdp":"v=0..."}}
//! {"type":"ice-candidate","candidate":{"candidate":"candidate:1 1 UDP ...","sdpMid":"0","sdpMLineIndex":0}}
//! {"type":"error","message":"busy"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// SDP type of a session description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// Session description payload (`RTCSessionDescriptionInit` shape)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// ICE candidate payload (`RTCIceCandidateInit` shape)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u16>,
    #[serde(rename = "usernameFragment", default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

/// Signaling message types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalingEnvelope {
    /// SDP offer from the remote peer
    Offer { offer: SessionDescription },
    /// SDP answer from this viewer
    Answer { answer: SessionDescription },
    /// Trickled ICE candidate (either direction)
    IceCandidate { candidate: IceCandidate },
    /// Handshake trigger: asks the remote side to start offering
    RequestStream,
    /// Failure reported by the far side
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl SignalingEnvelope {
    /// Parse a text frame
    pub fn from_json(text: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize to a text frame
    pub fn to_json(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Wire tag, for logging
    pub fn tag(&self) -> &'static str {
        match self {
            SignalingEnvelope::Offer { .. } => "offer",
            SignalingEnvelope::Answer { .. } => "answer",
            SignalingEnvelope::IceCandidate { .. } => "ice-candidate",
            SignalingEnvelope::RequestStream => "request-stream",
            SignalingEnvelope::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_stream_serialize() {
        let json = SignalingEnvelope::RequestStream.to_json().unwrap();
        assert_eq!(json, r#"{"type":"request-stream"}"#);
    }

    #[test]
    fn test_answer_serialize() {
        let msg = SignalingEnvelope::Answer {
            answer: SessionDescription::answer("v=0\r\n"),
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"answer\""));
        assert!(json.contains("\"answer\":{\"type\":\"answer\",\"sdp\":\"v=0\\r\\n\"}"));
    }

    #[test]
    fn test_offer_deserialize() {
        let json = r#"{"type":"offer","offer":{"type":"offer","sdp":"v=0\r\n"}}"#;
        match SignalingEnvelope::from_json(json).unwrap() {
            SignalingEnvelope::Offer { offer } => {
                assert_eq!(offer.kind, SdpKind::Offer);
                assert_eq!(offer.sdp, "v=0\r\n");
            }
            other => panic!("Expected offer, got {:?}", other),
        }
    }

    #[test]
    fn test_ice_candidate_deserialize() {
        let json = r#"{"type":"ice-candidate","candidate":{"candidate":"candidate:1 1 UDP 2130706431 192.168.1.1 8189 typ host","sdpMid":"0","sdpMLineIndex":0}}"#;
        match SignalingEnvelope::from_json(json).unwrap() {
            SignalingEnvelope::IceCandidate { candidate } => {
                assert!(candidate.candidate.starts_with("candidate:"));
                assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
                assert_eq!(candidate.sdp_mline_index, Some(0));
                assert_eq!(candidate.username_fragment, None);
            }
            other => panic!("Expected ice-candidate, got {:?}", other),
        }
    }

    #[test]
    fn test_error_message_is_optional() {
        assert_eq!(
            SignalingEnvelope::from_json(r#"{"type":"error","message":"busy"}"#).unwrap(),
            SignalingEnvelope::Error { message: Some("busy".into()) }
        );
        assert_eq!(
            SignalingEnvelope::from_json(r#"{"type":"error"}"#).unwrap(),
            SignalingEnvelope::Error { message: None }
        );
    }

    #[test]
    fn test_malformed_frames_are_rejected() {
        for frame in [
            "not json",
            r#"{"type":"bogus"}"#,
            r#"{"type":"offer"}"#,
            r#"{"offer":{"type":"offer","sdp":""}}"#,
            r#"{"type":"ice-candidate","candidate":{"sdpMid":"0"}}"#,
        ] {
            let err = SignalingEnvelope::from_json(frame).unwrap_err();
            assert!(matches!(err, SessionError::MalformedEnvelope(_)), "{}", frame);
        }
    }
}
