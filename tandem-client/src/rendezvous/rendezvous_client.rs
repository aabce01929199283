use async_trait::async_trait;
use tandem_core::{RoomId, TransportId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RendezvousError {
    #[error("invalid rendezvous server url: {0}")]
    InvalidUrl(String),

    #[error("rendezvous server unreachable: {0}")]
    Network(String),

    #[error("rendezvous server returned status {0}")]
    Status(u16),

    #[error("invalid rendezvous response: {0}")]
    Decode(String),

    #[error("room {0} is claimed by another host")]
    Conflict(RoomId),
}

/// Request/response access to the room directory.
#[async_trait]
pub trait RendezvousClient: Send + Sync {
    async fn lookup(&self, room_id: &RoomId) -> Result<Option<TransportId>, RendezvousError>;

    /// `Ok(false)` when the server refused the claim.
    async fn register(
        &self,
        room_id: &RoomId,
        transport_id: &TransportId,
    ) -> Result<bool, RendezvousError>;
}
