use async_trait::async_trait;
use tandem_core::{RoomId, TransportId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
}

/// Directory from room to the transport identity of its current host.
///
/// The in-memory implementation lives for the process only. A deployment with
/// several server instances plugs a shared key-value backend in here.
#[async_trait]
pub trait RendezvousStore: Send + Sync {
    /// Current host binding for the room, if any.
    async fn lookup(&self, room_id: &RoomId) -> Result<Option<TransportId>, StoreError>;

    /// Unconditional replace of the room's binding.
    async fn register(&self, room_id: RoomId, transport_id: TransportId)
    -> Result<(), StoreError>;

    /// Binds only when the room is unbound or already bound to `transport_id`.
    /// Returns whether the binding now points at `transport_id`.
    async fn register_if_vacant(
        &self,
        room_id: RoomId,
        transport_id: TransportId,
    ) -> Result<bool, StoreError>;
}
