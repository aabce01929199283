use crate::media::{LocalStream, TrackKind};
use crate::session::attempt::Attempt;
use crate::session::session_driver::SessionDriver;
use crate::session::{ConnectionState, ControlError, SessionConfig, SessionServices, SessionSnapshot};
use crate::transport::RemoteStream;
use std::sync::Arc;
use tandem_core::RoomId;
use tokio::sync::watch;
use tracing::info;

/// Client side of one room: drives media capture, rendezvous and the call,
/// and exposes the result as a stream of snapshots.
///
/// Dropping the session leaves the room.
pub struct CallSession {
    room_id: RoomId,
    services: SessionServices,
    config: SessionConfig,
    state: Arc<watch::Sender<SessionSnapshot>>,
    attempt: Arc<Attempt>,
}

impl CallSession {
    /// Start joining `room_id`. Must be called within a tokio runtime.
    pub fn start(room_id: RoomId, services: SessionServices, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::new(room_id.clone()));
        let state = Arc::new(state);
        let attempt = Arc::new(Attempt::new(state.clone()));
        let session = Self {
            room_id,
            services,
            config,
            state,
            attempt,
        };
        session.spawn_driver();
        session
    }

    fn spawn_driver(&self) {
        let driver = SessionDriver::new(
            self.room_id.clone(),
            self.services.clone(),
            self.config.clone(),
            self.attempt.clone(),
        );
        tokio::spawn(driver.run());
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().connection_state
    }

    /// New video enabled flag, `None` while there is no local media.
    pub async fn toggle_video(&self) -> Option<bool> {
        self.attempt.toggle(TrackKind::Video).await
    }

    /// New audio enabled flag, `None` while there is no local media.
    pub async fn toggle_audio(&self) -> Option<bool> {
        self.attempt.toggle(TrackKind::Audio).await
    }

    pub async fn local_stream(&self) -> Option<LocalStream> {
        self.attempt.local_stream().await
    }

    pub async fn remote_stream(&self) -> Option<RemoteStream> {
        self.attempt.remote_stream().await
    }

    /// Stop local media, hang up, release the transport identity and move to
    /// `Left`. Idempotent.
    pub async fn leave(&self) {
        self.attempt.leave().await;
    }

    /// Start over after a failure. Any other state is left untouched.
    pub async fn retry(&mut self) -> Result<(), ControlError> {
        let current = self.state();
        if !matches!(current, ConnectionState::Failed(_)) {
            return Err(ControlError::NotFailed(current));
        }
        info!("Retrying room {}", self.room_id);

        // Failing already released the old attempt; this only makes sure.
        self.attempt.finish(current, None).await;

        self.attempt = Arc::new(Attempt::new(self.state.clone()));
        self.state.send_modify(|snapshot| {
            *snapshot = SessionSnapshot::new(self.room_id.clone());
        });
        self.spawn_driver();
        Ok(())
    }

    /// Resolves with the first state matching `done`, including the current one.
    pub async fn wait_for(&self, mut done: impl FnMut(&ConnectionState) -> bool) -> ConnectionState {
        let mut rx = self.subscribe();
        match rx.wait_for(|snapshot| done(&snapshot.connection_state)).await {
            Ok(snapshot) => snapshot.connection_state,
            Err(_) => self.state(),
        }
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        self.attempt.cancel_token().cancel();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let attempt = self.attempt.clone();
            runtime.spawn(async move { attempt.leave().await });
        }
    }
}
