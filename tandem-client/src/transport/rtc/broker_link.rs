use crate::media::LocalStream;
use crate::transport::rtc::WebRtcTransportConfig;
use crate::transport::rtc::peer_connection::{self, RtcAnswerer};
use crate::transport::{CallError, IdentityError, IncomingCall, MediaCall, PeerEndpoint};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{CallId, IceServerConfig, SignalMessage, TransportId};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type BrokerSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type BrokerStream = futures::stream::SplitStream<BrokerSocket>;

pub(super) struct CallRoute {
    peer: TransportId,
    inbox: mpsc::UnboundedSender<SignalMessage>,
}

/// State shared by the endpoint handle, the socket tasks and the calls.
pub(super) struct EndpointInner {
    pub(super) id: TransportId,
    pub(super) ice_servers: Vec<IceServerConfig>,
    outbound: mpsc::UnboundedSender<SignalMessage>,
    calls: DashMap<CallId, CallRoute>,
    shutdown: CancellationToken,
}

impl EndpointInner {
    /// Queue a message for the broker. False once the connection is gone.
    pub(super) fn send(&self, msg: SignalMessage) -> bool {
        !self.shutdown.is_cancelled() && self.outbound.send(msg).is_ok()
    }

    pub(super) fn open_route(
        &self,
        call_id: &CallId,
        peer: &TransportId,
    ) -> mpsc::UnboundedReceiver<SignalMessage> {
        let (inbox, rx) = mpsc::unbounded_channel();
        self.calls.insert(
            call_id.clone(),
            CallRoute {
                peer: peer.clone(),
                inbox,
            },
        );
        rx
    }

    pub(super) fn close_route(&self, call_id: &CallId) {
        self.calls.remove(call_id);
    }

    #[cfg(test)]
    pub(super) fn detached(id: TransportId) -> (Arc<Self>, mpsc::UnboundedReceiver<SignalMessage>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Self {
            id,
            ice_servers: Vec::new(),
            outbound,
            calls: DashMap::new(),
            shutdown: CancellationToken::new(),
        });
        (inner, rx)
    }

    #[cfg(test)]
    pub(super) fn has_route(&self, call_id: &CallId) -> bool {
        self.calls.contains_key(call_id)
    }

    fn route(&self, call_id: &CallId, msg: SignalMessage) {
        match self.calls.get(call_id) {
            Some(route) => {
                let _ = route.inbox.send(msg);
            }
            None => debug!("No call {} on {}, dropping {:?}", call_id, self.id, msg),
        }
    }
}

/// A transport identity held open by a broker WebSocket.
pub struct WebRtcEndpoint {
    inner: Arc<EndpointInner>,
    incoming: Mutex<mpsc::UnboundedReceiver<IncomingCall>>,
}

impl WebRtcEndpoint {
    pub async fn connect(config: &WebRtcTransportConfig) -> Result<Self, IdentityError> {
        let (socket, _) = connect_async(config.broker_url.as_str())
            .await
            .map_err(|e| IdentityError::Unreachable(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let (id, ice_servers) = tokio::time::timeout(
            HANDSHAKE_TIMEOUT,
            handshake(&mut stream, config.ice_servers.clone()),
        )
        .await
        .map_err(|_| IdentityError::Unreachable("broker did not assign an identity".into()))??;
        info!("Transport identity {} assigned by {}", id, config.broker_url);

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<SignalMessage>();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let inner = Arc::new(EndpointInner {
            id,
            ice_servers,
            outbound,
            calls: DashMap::new(),
            shutdown: shutdown.clone(),
        });

        let writer_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    msg = outbound_rx.recv() => {
                        let Some(msg) = msg else { break };
                        let text = match serde_json::to_string(&msg) {
                            Ok(text) => text,
                            Err(e) => {
                                error!("Failed to encode broker message: {}", e);
                                continue;
                            }
                        };
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    _ = writer_shutdown.cancelled() => break,
                }
            }
            let _ = sink.close().await;
        });

        let reader = inner.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reader.shutdown.cancelled() => break,
                    frame = stream.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<SignalMessage>(&text) {
                                Ok(msg) => dispatch(&reader, &incoming_tx, msg),
                                Err(e) => warn!("Invalid broker message: {}", e),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!("Broker closed the connection of {}", reader.id);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("Broker connection of {} failed: {}", reader.id, e);
                            break;
                        }
                    }
                }
            }
            reader.shutdown.cancel();
            reader.calls.clear();
        });

        Ok(Self {
            inner,
            incoming: Mutex::new(incoming_rx),
        })
    }
}

async fn handshake(
    stream: &mut BrokerStream,
    mut ice_servers: Vec<IceServerConfig>,
) -> Result<(TransportId, Vec<IceServerConfig>), IdentityError> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<SignalMessage>(&text) {
                Ok(SignalMessage::IceConfig { ice_servers: servers }) => ice_servers = servers,
                Ok(SignalMessage::Welcome { peer_id }) => return Ok((peer_id, ice_servers)),
                Ok(other) => debug!("Ignoring {:?} before welcome", other),
                Err(e) => warn!("Invalid broker message: {}", e),
            },
            Some(Ok(Message::Close(_))) | None => {
                return Err(IdentityError::Rejected(
                    "broker closed the connection".into(),
                ));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(IdentityError::Rejected(e.to_string())),
        }
    }
}

fn dispatch(
    inner: &Arc<EndpointInner>,
    incoming: &mpsc::UnboundedSender<IncomingCall>,
    msg: SignalMessage,
) {
    match msg {
        SignalMessage::Offer { peer, call_id, sdp } => {
            info!("Incoming call {} from {}", call_id, peer);
            let inbox = inner.open_route(&call_id, &peer);
            let answerer = RtcAnswerer::new(inner.clone(), peer.clone(), call_id, sdp, inbox);
            if incoming
                .send(IncomingCall::new(peer, Box::new(answerer)))
                .is_err()
            {
                debug!("Endpoint {} is no longer accepting calls", inner.id);
            }
        }
        SignalMessage::Answer { ref call_id, .. }
        | SignalMessage::IceCandidate { ref call_id, .. }
        | SignalMessage::Hangup { ref call_id, .. } => {
            let call_id = call_id.clone();
            inner.route(&call_id, msg);
        }
        SignalMessage::Expire { peer } => {
            warn!("Peer {} is not connected to the broker", peer);
            for route in inner.calls.iter().filter(|route| route.peer == peer) {
                let _ = route.inbox.send(SignalMessage::Expire { peer: peer.clone() });
            }
        }
        other => debug!("Ignoring {:?}", other),
    }
}

#[async_trait]
impl PeerEndpoint for WebRtcEndpoint {
    fn id(&self) -> TransportId {
        self.inner.id.clone()
    }

    async fn call(
        &self,
        remote: &TransportId,
        local: &LocalStream,
    ) -> Result<MediaCall, CallError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(CallError::SignalingLost);
        }
        let call_id = Uuid::new_v4().to_string();
        peer_connection::place_call(self.inner.clone(), remote.clone(), call_id, local)
            .await
            .map_err(|e| {
                if self.inner.shutdown.is_cancelled() {
                    CallError::SignalingLost
                } else {
                    CallError::Negotiation(format!("{:#}", e))
                }
            })
    }

    async fn accept(&self) -> Result<IncomingCall, IdentityError> {
        self.incoming
            .lock()
            .await
            .recv()
            .await
            .ok_or(IdentityError::Lost)
    }

    async fn destroy(&self) {
        if !self.inner.shutdown.is_cancelled() {
            info!("Releasing transport identity {}", self.inner.id);
        }
        self.inner.shutdown.cancel();
    }
}

impl Drop for WebRtcEndpoint {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}
