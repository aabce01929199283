use crate::model::transport::TransportId;
use serde::{Deserialize, Serialize};

/// Correlates the negotiation messages of one call.
pub type CallId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Broker envelope. Client to server, `peer` names the destination; the
/// broker rewrites it to the source identity before forwarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum SignalMessage {
    IceConfig {
        ice_servers: Vec<IceServerConfig>,
    },
    Welcome {
        peer_id: TransportId,
    },
    Offer {
        peer: TransportId,
        call_id: CallId,
        sdp: String,
    },
    Answer {
        peer: TransportId,
        call_id: CallId,
        sdp: String,
    },
    IceCandidate {
        peer: TransportId,
        call_id: CallId,
        candidate: String,
        sdp_mid: Option<String>,
        sdp_m_line_index: Option<u16>,
    },
    Hangup {
        peer: TransportId,
        call_id: CallId,
    },
    /// Destination identity is not connected to the broker.
    Expire {
        peer: TransportId,
    },
}

impl SignalMessage {
    /// Peer addressed (or originating) by a relayable message.
    pub fn peer(&self) -> Option<&TransportId> {
        match self {
            SignalMessage::Offer { peer, .. }
            | SignalMessage::Answer { peer, .. }
            | SignalMessage::IceCandidate { peer, .. }
            | SignalMessage::Hangup { peer, .. } => Some(peer),
            _ => None,
        }
    }

    /// Same message with `peer` replaced. Non-relayable messages are returned as is.
    pub fn with_peer(self, new_peer: TransportId) -> Self {
        match self {
            SignalMessage::Offer { call_id, sdp, .. } => SignalMessage::Offer {
                peer: new_peer,
                call_id,
                sdp,
            },
            SignalMessage::Answer { call_id, sdp, .. } => SignalMessage::Answer {
                peer: new_peer,
                call_id,
                sdp,
            },
            SignalMessage::IceCandidate {
                call_id,
                candidate,
                sdp_mid,
                sdp_m_line_index,
                ..
            } => SignalMessage::IceCandidate {
                peer: new_peer,
                call_id,
                candidate,
                sdp_mid,
                sdp_m_line_index,
            },
            SignalMessage::Hangup { call_id, .. } => SignalMessage::Hangup {
                peer: new_peer,
                call_id,
            },
            other => other,
        }
    }
}
