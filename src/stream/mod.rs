//! Inbound media stream handles.
//!
//! A [`RemoteStream`] groups the remote tracks that arrived under one
//! stream id. The webrtc-rs track is kept so callers can read RTP from it.

use std::fmt;
use std::sync::Arc;

use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_remote::TrackRemote;

/// Media kind of a remote track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub(crate) fn from_codec_type(kind: RTPCodecType) -> Option<Self> {
        match kind {
            RTPCodecType::Audio => Some(MediaKind::Audio),
            RTPCodecType::Video => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// One track of a remote stream
#[derive(Clone)]
pub struct RemoteTrack {
    id: String,
    kind: MediaKind,
    remote: Option<Arc<TrackRemote>>,
}

impl RemoteTrack {
    /// Track without a webrtc-rs backing (signaling-only peers, tests)
    pub fn detached(id: &str, kind: MediaKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            remote: None,
        }
    }

    pub(crate) fn from_remote(track: Arc<TrackRemote>, kind: MediaKind) -> Self {
        Self {
            id: track.id(),
            kind,
            remote: Some(track),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// The underlying webrtc-rs track, for reading RTP
    pub fn remote(&self) -> Option<&Arc<TrackRemote>> {
        self.remote.as_ref()
    }
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("attached", &self.remote.is_some())
            .finish()
    }
}

// Identity is the track id; the webrtc-rs handle is not compared.
impl PartialEq for RemoteTrack {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.kind == other.kind
    }
}

/// Inbound media stream received from the remote peer
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteStream {
    id: String,
    tracks: Vec<RemoteTrack>,
}

impl RemoteStream {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            tracks: Vec::new(),
        }
    }

    pub fn with_track(mut self, track: RemoteTrack) -> Self {
        self.add_track(track);
        self
    }

    /// Add a track, replacing any earlier track with the same id
    pub fn add_track(&mut self, track: RemoteTrack) {
        self.tracks.retain(|t| t.id != track.id);
        self.tracks.push(track);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[RemoteTrack] {
        &self.tracks
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &RemoteTrack> {
        self.tracks.iter().filter(|t| t.kind == MediaKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &RemoteTrack> {
        self.tracks.iter().filter(|t| t.kind == MediaKind::Video)
    }
}
