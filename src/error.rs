//! Error types for viewer sessions.

use thiserror::Error;

/// Errors that can occur while establishing or running a viewer session.
///
/// Only the open-time kinds (`InvalidUrl`, `TransportOpen`) are ever returned
/// from [`ViewerSession::connect`](crate::ViewerSession::connect). Everything
/// else is reported through the `failed` state and its error message.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid signaling server URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to connect to signaling server: {0}")]
    TransportOpen(String),

    #[error("Signaling connection error: {0}")]
    TransportRuntime(String),

    #[error("Malformed signaling message: {0}")]
    MalformedEnvelope(#[from] serde_json::Error),

    #[error("Failed to process server message: {0}")]
    Negotiation(String),

    #[error("{0}")]
    RemoteReported(String),
}

impl SessionError {
    /// Whether this error happened before the signaling transport was open.
    pub fn is_open_failure(&self) -> bool {
        matches!(self, SessionError::InvalidUrl(_) | SessionError::TransportOpen(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_failures_are_classified() {
        assert!(SessionError::InvalidUrl("x".into()).is_open_failure());
        assert!(SessionError::TransportOpen("refused".into()).is_open_failure());
        assert!(!SessionError::Negotiation("bad sdp".into()).is_open_failure());
        assert!(!SessionError::TransportRuntime("reset".into()).is_open_failure());
    }

    #[test]
    fn test_remote_error_displays_message_verbatim() {
        assert_eq!(SessionError::RemoteReported("busy".into()).to_string(), "busy");
    }
}
