use crate::media::{LocalStream, TrackKind};
use crate::session::{ConnectionState, SessionError, SessionRole, SessionSnapshot};
use crate::transport::{CallControl, PeerEndpoint, RemoteStream};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Default)]
struct Resources {
    active: bool,
    stream: Option<LocalStream>,
    endpoint: Option<Arc<dyn PeerEndpoint>>,
    call: Option<Arc<dyn CallControl>>,
    remote: Option<RemoteStream>,
}

impl Resources {
    fn take(&mut self) -> Released {
        self.remote = None;
        Released {
            stream: self.stream.take(),
            call: self.call.take(),
            endpoint: self.endpoint.take(),
        }
    }
}

/// Resources detached from an attempt, waiting to be released.
#[derive(Default)]
struct Released {
    stream: Option<LocalStream>,
    call: Option<Arc<dyn CallControl>>,
    endpoint: Option<Arc<dyn PeerEndpoint>>,
}

impl Released {
    /// Camera and microphone stop first, then the call, then the identity.
    async fn release(self) {
        if let Some(stream) = self.stream {
            stream.stop();
        }
        if let Some(call) = self.call {
            call.close().await;
        }
        if let Some(endpoint) = self.endpoint {
            endpoint.destroy().await;
        }
    }
}

fn transition(snapshot: &mut SessionSnapshot, next: ConnectionState) {
    if snapshot.connection_state != next {
        info!(
            "Room {}: {} -> {}",
            snapshot.room_id, snapshot.connection_state, next
        );
        snapshot.connection_state = next;
    }
}

/// One run of the session state machine. Everything it acquires is held
/// here; once inactive, nothing more is adopted or published and late
/// results are released on arrival.
pub(crate) struct Attempt {
    cancel: CancellationToken,
    state: Arc<watch::Sender<SessionSnapshot>>,
    resources: Mutex<Resources>,
}

impl Attempt {
    pub(crate) fn new(state: Arc<watch::Sender<SessionSnapshot>>) -> Self {
        Self {
            cancel: CancellationToken::new(),
            state,
            resources: Mutex::new(Resources {
                active: true,
                ..Default::default()
            }),
        }
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Publish a state change. False if the attempt is no longer active.
    pub(crate) async fn publish(&self, next: ConnectionState, role: Option<SessionRole>) -> bool {
        let resources = self.resources.lock().await;
        if !resources.active {
            return false;
        }
        self.state.send_modify(|snapshot| {
            transition(snapshot, next);
            if role.is_some() {
                snapshot.role = role;
            }
        });
        true
    }

    pub(crate) async fn adopt_stream(&self, stream: LocalStream) -> bool {
        let mut resources = self.resources.lock().await;
        if !resources.active {
            drop(resources);
            debug!("Stopping local stream acquired after the attempt ended");
            stream.stop();
            return false;
        }
        self.state.send_modify(|snapshot| {
            snapshot.audio_enabled = stream.is_enabled(TrackKind::Audio);
            snapshot.video_enabled = stream.is_enabled(TrackKind::Video);
            transition(snapshot, ConnectionState::MediaReady);
        });
        resources.stream = Some(stream);
        true
    }

    pub(crate) async fn adopt_endpoint(&self, endpoint: Arc<dyn PeerEndpoint>) -> bool {
        let mut resources = self.resources.lock().await;
        if !resources.active {
            drop(resources);
            debug!(
                "Destroying transport identity {} obtained after the attempt ended",
                endpoint.id()
            );
            endpoint.destroy().await;
            return false;
        }
        self.state.send_modify(|snapshot| {
            snapshot.local_id = Some(endpoint.id());
            transition(snapshot, ConnectionState::Registering);
        });
        resources.endpoint = Some(endpoint);
        true
    }

    pub(crate) async fn adopt_call(&self, call: Arc<dyn CallControl>) -> bool {
        let mut resources = self.resources.lock().await;
        if !resources.active {
            drop(resources);
            debug!("Closing call established after the attempt ended");
            call.close().await;
            return false;
        }
        resources.call = Some(call);
        true
    }

    pub(crate) async fn adopt_remote(&self, remote: RemoteStream) -> bool {
        let mut resources = self.resources.lock().await;
        if !resources.active {
            return false;
        }
        self.state.send_modify(|snapshot| {
            snapshot.remote_stream_present = true;
            transition(snapshot, ConnectionState::Connected);
        });
        resources.remote = Some(remote);
        true
    }

    pub(crate) async fn toggle(&self, kind: TrackKind) -> Option<bool> {
        let resources = self.resources.lock().await;
        if !resources.active {
            return None;
        }
        let enabled = resources.stream.as_ref()?.toggle(kind)?;
        self.state.send_modify(|snapshot| match kind {
            TrackKind::Audio => snapshot.audio_enabled = enabled,
            TrackKind::Video => snapshot.video_enabled = enabled,
        });
        Some(enabled)
    }

    pub(crate) async fn local_stream(&self) -> Option<LocalStream> {
        self.resources.lock().await.stream.clone()
    }

    pub(crate) async fn remote_stream(&self) -> Option<RemoteStream> {
        self.resources.lock().await.remote.clone()
    }

    /// End the attempt in a terminal state and release everything it holds.
    /// No-op if the attempt already ended.
    pub(crate) async fn finish(&self, terminal: ConnectionState, error: Option<SessionError>) {
        let released = {
            let mut resources = self.resources.lock().await;
            if !resources.active {
                return;
            }
            resources.active = false;
            self.cancel.cancel();
            self.state.send_modify(|snapshot| {
                transition(snapshot, terminal);
                snapshot.remote_stream_present = false;
                if error.is_some() {
                    snapshot.last_error = error;
                }
            });
            resources.take()
        };
        released.release().await;
    }

    /// Cancel whatever is in flight, release everything and publish `Left`.
    /// Safe to call repeatedly and after the attempt ended on its own.
    pub(crate) async fn leave(&self) {
        let released = {
            let mut resources = self.resources.lock().await;
            self.cancel.cancel();
            resources.active = false;
            self.state.send_if_modified(|snapshot| {
                let changed = snapshot.connection_state != ConnectionState::Left
                    || snapshot.remote_stream_present;
                transition(snapshot, ConnectionState::Left);
                snapshot.remote_stream_present = false;
                changed
            });
            resources.take()
        };
        released.release().await;
    }
}
