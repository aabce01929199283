use crate::store::{RendezvousStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tandem_core::{RoomId, TransportId};
use tracing::debug;

/// Sharded in-memory rendezvous directory.
///
/// Rooms on different shards never contend; operations on one room are atomic.
/// Entries are never evicted.
#[derive(Default)]
pub struct InMemoryStore {
    rooms: DashMap<RoomId, TransportId>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[async_trait]
impl RendezvousStore for InMemoryStore {
    async fn lookup(&self, room_id: &RoomId) -> Result<Option<TransportId>, StoreError> {
        Ok(self.rooms.get(room_id).map(|entry| entry.value().clone()))
    }

    async fn register(
        &self,
        room_id: RoomId,
        transport_id: TransportId,
    ) -> Result<(), StoreError> {
        if let Some(previous) = self.rooms.insert(room_id.clone(), transport_id) {
            debug!("Room {} host binding replaced (was {})", room_id, previous);
        }
        Ok(())
    }

    async fn register_if_vacant(
        &self,
        room_id: RoomId,
        transport_id: TransportId,
    ) -> Result<bool, StoreError> {
        match self.rooms.entry(room_id) {
            Entry::Occupied(entry) => Ok(entry.get() == &transport_id),
            Entry::Vacant(entry) => {
                entry.insert(transport_id);
                Ok(true)
            }
        }
    }
}
