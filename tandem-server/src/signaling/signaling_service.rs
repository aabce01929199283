use axum::extract::ws::Message;
use dashmap::DashMap;
use std::sync::Arc;
use tandem_core::{IceServerConfig, SignalMessage, TransportId};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

struct SignalingInner {
    peers: DashMap<TransportId, mpsc::UnboundedSender<Message>>,
    ice_servers: Vec<IceServerConfig>,
}

/// Identity table of the transport broker: one outbound queue per connected
/// client, keyed by the transport identity the broker assigned to it.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                peers: DashMap::new(),
                ice_servers,
            }),
        }
    }

    pub fn get_ice_servers(&self) -> Vec<IceServerConfig> {
        self.inner.ice_servers.clone()
    }

    pub fn add_peer(&self, peer_id: TransportId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.peers.insert(peer_id, tx);
    }

    pub fn remove_peer(&self, peer_id: &TransportId) {
        self.inner.peers.remove(peer_id);
    }

    pub fn is_connected(&self, peer_id: &TransportId) -> bool {
        self.inner.peers.contains_key(peer_id)
    }

    pub fn peer_count(&self) -> usize {
        self.inner.peers.len()
    }

    /// Queue a message for one peer. Returns false if the peer is gone.
    pub fn send_signal(&self, peer_id: &TransportId, msg: SignalMessage) -> bool {
        let Some(peer) = self.inner.peers.get(peer_id) else {
            warn!("Attempted to send signal to disconnected peer {}", peer_id);
            return false;
        };

        match serde_json::to_string(&msg) {
            Ok(json) => {
                if let Err(e) = peer.send(Message::Text(json.into())) {
                    error!("Failed to send WS message to {}: {:?}", peer_id, e);
                    return false;
                }
                true
            }
            Err(e) => {
                error!("Failed to serialize signal message: {}", e);
                false
            }
        }
    }

    /// Forward a negotiation message from `source` to the peer it names,
    /// rewriting the peer field to `source`. Unreachable destinations are
    /// reported back to the sender as `Expire`.
    pub fn relay(&self, source: &TransportId, msg: SignalMessage) {
        let Some(destination) = msg.peer().cloned() else {
            warn!("Peer {} sent a non-relayable message: {:?}", source, msg);
            return;
        };

        debug!("Relaying message {} -> {}", source, destination);

        if !self.send_signal(&destination, msg.with_peer(source.clone())) {
            self.send_signal(source, SignalMessage::Expire { peer: destination });
        }
    }
}
