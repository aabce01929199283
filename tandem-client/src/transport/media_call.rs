use crate::media::LocalStream;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tandem_core::TransportId;
use thiserror::Error;
use tokio::sync::mpsc;
use webrtc::track::track_remote::TrackRemote;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("peer {0} is not reachable")]
    PeerUnavailable(TransportId),

    #[error("call negotiation failed: {0}")]
    Negotiation(String),

    #[error("transport failed during call: {0}")]
    Transport(String),

    #[error("call closed before remote media arrived")]
    ClosedBeforeMedia,

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// The broker connection went away before the call was established.
    #[error("signaling connection lost before the call was established")]
    SignalingLost,
}

/// Media received from the other participant.
#[derive(Clone)]
pub struct RemoteStream {
    id: String,
    tracks: Vec<Arc<TrackRemote>>,
}

impl RemoteStream {
    pub fn new(id: impl Into<String>, tracks: Vec<Arc<TrackRemote>>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[Arc<TrackRemote>] {
        &self.tracks
    }
}

impl fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStream")
            .field("id", &self.id)
            .field("tracks", &self.tracks.len())
            .finish()
    }
}

#[derive(Debug)]
pub enum CallEvent {
    Stream(RemoteStream),
    Closed,
    Error(CallError),
}

/// Hangs up a call. Shared so the session can close a call whose events are
/// being consumed elsewhere.
#[async_trait]
pub trait CallControl: Send + Sync {
    async fn close(&self);
}

/// An established or in-flight call.
pub struct MediaCall {
    peer: TransportId,
    events: mpsc::Receiver<CallEvent>,
    control: Arc<dyn CallControl>,
}

impl MediaCall {
    pub fn new(
        peer: TransportId,
        events: mpsc::Receiver<CallEvent>,
        control: Arc<dyn CallControl>,
    ) -> Self {
        Self {
            peer,
            events,
            control,
        }
    }

    pub fn peer(&self) -> &TransportId {
        &self.peer
    }

    /// `Closed` once the event source is gone.
    pub async fn next_event(&mut self) -> CallEvent {
        self.events.recv().await.unwrap_or(CallEvent::Closed)
    }

    pub fn control(&self) -> Arc<dyn CallControl> {
        self.control.clone()
    }

    pub async fn close(&self) {
        self.control.close().await;
    }
}

impl fmt::Debug for MediaCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaCall").field("peer", &self.peer).finish()
    }
}

/// Transport side of an unanswered incoming call.
#[async_trait]
pub trait CallAnswerer: Send {
    async fn answer(self: Box<Self>, local: &LocalStream) -> Result<MediaCall, CallError>;

    async fn decline(self: Box<Self>);
}

pub struct IncomingCall {
    peer: TransportId,
    answerer: Box<dyn CallAnswerer>,
}

impl IncomingCall {
    pub fn new(peer: TransportId, answerer: Box<dyn CallAnswerer>) -> Self {
        Self { peer, answerer }
    }

    pub fn peer(&self) -> &TransportId {
        &self.peer
    }

    pub async fn answer(self, local: &LocalStream) -> Result<MediaCall, CallError> {
        self.answerer.answer(local).await
    }

    pub async fn decline(self) {
        self.answerer.decline().await
    }
}

impl fmt::Debug for IncomingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingCall")
            .field("peer", &self.peer)
            .finish()
    }
}
