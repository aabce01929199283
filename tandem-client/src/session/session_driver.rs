use crate::media::{LocalStream, MediaError};
use crate::rendezvous::RendezvousError;
use crate::session::attempt::Attempt;
use crate::session::{ConnectionState, SessionConfig, SessionError, SessionRole, SessionServices};
use crate::transport::{CallError, CallEvent, IdentityError, MediaCall, PeerEndpoint};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{RoomId, TransportId};
use tracing::{debug, info, warn};

/// Reconnect-in-place attempts allowed while waiting as host.
const MAX_RECONNECTS: usize = 1;

/// Why the driver stopped before reaching a terminal state on its own.
enum Exit {
    Cancelled,
    Failed(SessionError),
}

impl From<SessionError> for Exit {
    fn from(err: SessionError) -> Self {
        Exit::Failed(err)
    }
}

impl From<MediaError> for Exit {
    fn from(err: MediaError) -> Self {
        Exit::Failed(err.into())
    }
}

impl From<IdentityError> for Exit {
    fn from(err: IdentityError) -> Self {
        Exit::Failed(err.into())
    }
}

impl From<CallError> for Exit {
    fn from(err: CallError) -> Self {
        Exit::Failed(err.into())
    }
}

impl From<RendezvousError> for Exit {
    fn from(err: RendezvousError) -> Self {
        Exit::Failed(err.into())
    }
}

/// A call that fails because the broker went away is an identity loss.
fn call_failed(err: CallError) -> Exit {
    match err {
        CallError::SignalingLost => IdentityError::Lost.into(),
        other => other.into(),
    }
}

/// Runs one attempt: media, identity, rendezvous, call, then the call's
/// lifetime. Every await is raced against the attempt's cancellation.
pub(crate) struct SessionDriver {
    room_id: RoomId,
    services: SessionServices,
    config: SessionConfig,
    attempt: Arc<Attempt>,
}

impl SessionDriver {
    pub(crate) fn new(
        room_id: RoomId,
        services: SessionServices,
        config: SessionConfig,
        attempt: Arc<Attempt>,
    ) -> Self {
        Self {
            room_id,
            services,
            config,
            attempt,
        }
    }

    pub(crate) async fn run(self) {
        match self.establish().await {
            Ok(()) => {}
            Err(Exit::Cancelled) => debug!("Session attempt for room {} stopped", self.room_id),
            Err(Exit::Failed(err)) => {
                warn!("Session for room {} failed: {}", self.room_id, err);
                self.attempt
                    .finish(ConnectionState::Failed(err.kind()), Some(err))
                    .await;
            }
        }
    }

    async fn guarded<F: Future>(&self, fut: F) -> Result<F::Output, Exit> {
        tokio::select! {
            biased;
            _ = self.attempt.cancel_token().cancelled() => Err(Exit::Cancelled),
            out = fut => Ok(out),
        }
    }

    async fn timed<F: Future>(
        &self,
        limit: Option<Duration>,
        waiting_for: &'static str,
        fut: F,
    ) -> Result<F::Output, Exit> {
        match limit {
            Some(limit) => self
                .guarded(tokio::time::timeout(limit, fut))
                .await?
                .map_err(|_| CallError::Timeout(waiting_for).into()),
            None => self.guarded(fut).await,
        }
    }

    async fn publish(&self, state: ConnectionState, role: Option<SessionRole>) -> Result<(), Exit> {
        if self.attempt.publish(state, role).await {
            Ok(())
        } else {
            Err(Exit::Cancelled)
        }
    }

    async fn establish(&self) -> Result<(), Exit> {
        info!("Joining room {}", self.room_id);

        let stream = self
            .guarded(self.services.media.acquire(self.config.constraints))
            .await??;
        if !self.attempt.adopt_stream(stream.clone()).await {
            return Err(Exit::Cancelled);
        }

        let endpoint = self
            .guarded(self.services.transport.create_identity())
            .await??;
        let local_id = endpoint.id();
        if !self.attempt.adopt_endpoint(endpoint.clone()).await {
            return Err(Exit::Cancelled);
        }

        let host = self
            .guarded(self.services.rendezvous.lookup(&self.room_id))
            .await??;
        let (call, role) = match host {
            Some(host_id) if host_id != local_id => {
                (self.dial(endpoint.as_ref(), &host_id, &stream).await?, SessionRole::Guest)
            }
            _ => self.host(endpoint.as_ref(), &local_id, &stream).await?,
        };

        self.converse(endpoint.as_ref(), call, role).await
    }

    /// Register as host, or join whoever won the room if the claim is refused.
    async fn host(
        &self,
        endpoint: &dyn PeerEndpoint,
        local_id: &TransportId,
        stream: &LocalStream,
    ) -> Result<(MediaCall, SessionRole), Exit> {
        let claimed = self
            .guarded(self.services.rendezvous.register(&self.room_id, local_id))
            .await??;
        if !claimed {
            info!("Room {} was claimed by another host", self.room_id);
            let host = self
                .guarded(self.services.rendezvous.lookup(&self.room_id))
                .await??;
            return match host {
                Some(host_id) if &host_id != local_id => {
                    Ok((self.dial(endpoint, &host_id, stream).await?, SessionRole::Guest))
                }
                _ => Err(RendezvousError::Conflict(self.room_id.clone()).into()),
            };
        }

        info!("Hosting room {} as {}", self.room_id, local_id);
        self.publish(ConnectionState::AwaitingPeer, Some(SessionRole::Host))
            .await?;

        let mut reconnects = 0;
        loop {
            let next = self
                .timed(
                    self.config.await_peer_timeout,
                    "the other participant",
                    endpoint.accept(),
                )
                .await?;
            match next {
                Ok(incoming) => {
                    info!("Answering call from {}", incoming.peer());
                    let call = self
                        .guarded(incoming.answer(stream))
                        .await?
                        .map_err(call_failed)?;
                    if !self.attempt.adopt_call(call.control()).await {
                        return Err(Exit::Cancelled);
                    }
                    return Ok((call, SessionRole::Host));
                }
                Err(IdentityError::Lost) if reconnects < MAX_RECONNECTS => {
                    reconnects += 1;
                    warn!(
                        "Transport identity {} lost while waiting in room {}, reconnecting",
                        local_id, self.room_id
                    );
                    self.guarded(endpoint.reconnect()).await??;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Place exactly one call to the host.
    async fn dial(
        &self,
        endpoint: &dyn PeerEndpoint,
        host_id: &TransportId,
        stream: &LocalStream,
    ) -> Result<MediaCall, Exit> {
        self.publish(ConnectionState::Connecting, Some(SessionRole::Guest))
            .await?;
        info!("Calling host {} of room {}", host_id, self.room_id);

        let call = self
            .timed(
                self.config.connect_timeout,
                "the host to answer",
                endpoint.call(host_id, stream),
            )
            .await?
            .map_err(call_failed)?;
        if !self.attempt.adopt_call(call.control()).await {
            return Err(Exit::Cancelled);
        }
        Ok(call)
    }

    /// Wait for remote media, then follow the call until it ends. Further
    /// incoming calls are declined while this one is up.
    async fn converse(
        &self,
        endpoint: &dyn PeerEndpoint,
        mut call: MediaCall,
        role: SessionRole,
    ) -> Result<(), Exit> {
        let limit = match role {
            SessionRole::Host => self.config.await_peer_timeout,
            SessionRole::Guest => self.config.connect_timeout,
        };
        let remote = match self.timed(limit, "remote media", call.next_event()).await? {
            CallEvent::Stream(remote) => remote,
            CallEvent::Closed => return Err(CallError::ClosedBeforeMedia.into()),
            CallEvent::Error(e) => return Err(call_failed(e)),
        };
        info!("Remote media from {} arrived in room {}", call.peer(), self.room_id);
        if !self.attempt.adopt_remote(remote).await {
            return Err(Exit::Cancelled);
        }

        let mut accepting = true;
        loop {
            tokio::select! {
                biased;
                _ = self.attempt.cancel_token().cancelled() => return Err(Exit::Cancelled),
                event = call.next_event() => match event {
                    CallEvent::Stream(remote) => {
                        if !self.attempt.adopt_remote(remote).await {
                            return Err(Exit::Cancelled);
                        }
                    }
                    CallEvent::Closed => {
                        info!("{} left room {}", call.peer(), self.room_id);
                        self.attempt.finish(ConnectionState::Disconnected, None).await;
                        return Ok(());
                    }
                    CallEvent::Error(e) => return Err(call_failed(e)),
                },
                incoming = endpoint.accept(), if accepting => match incoming {
                    Ok(extra) => {
                        warn!("Room {} is full, declining call from {}", self.room_id, extra.peer());
                        extra.decline().await;
                    }
                    Err(e) => {
                        debug!("No longer accepting calls in room {}: {}", self.room_id, e);
                        accepting = false;
                    }
                },
            }
        }
    }
}
