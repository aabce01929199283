use crate::session::SessionError;
use std::fmt;
use tandem_core::{RoomId, TransportId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Media,
    Identity,
    Call,
    Rendezvous,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Media => write!(f, "media"),
            ErrorKind::Identity => write!(f, "identity"),
            ErrorKind::Call => write!(f, "call"),
            ErrorKind::Rendezvous => write!(f, "rendezvous"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Initializing,
    MediaReady,
    Registering,
    AwaitingPeer,
    Connecting,
    Connected,
    Disconnected,
    Failed(ErrorKind),
    Left,
}

impl ConnectionState {
    /// No further transitions happen without `retry` (and none at all from
    /// `Left`).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Failed(_) | ConnectionState::Left
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Initializing => write!(f, "initializing"),
            ConnectionState::MediaReady => write!(f, "media ready"),
            ConnectionState::Registering => write!(f, "registering"),
            ConnectionState::AwaitingPeer => write!(f, "awaiting peer"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Failed(kind) => write!(f, "failed ({})", kind),
            ConnectionState::Left => write!(f, "left"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// Registered itself and waits for the other participant to call.
    Host,
    /// Found a registered host and called it.
    Guest,
}

/// What the presentation layer sees of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub room_id: RoomId,
    pub connection_state: ConnectionState,
    pub role: Option<SessionRole>,
    pub local_id: Option<TransportId>,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub remote_stream_present: bool,
    pub last_error: Option<SessionError>,
}

impl SessionSnapshot {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            connection_state: ConnectionState::Initializing,
            role: None,
            local_id: None,
            audio_enabled: false,
            video_enabled: false,
            remote_stream_present: false,
            last_error: None,
        }
    }
}
