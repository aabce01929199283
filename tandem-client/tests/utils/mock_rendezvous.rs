use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tandem_client::{RendezvousClient, RendezvousError};
use tandem_core::{RoomId, TransportId};

/// In-process room directory. `compare_and_swap` mirrors the server strategy
/// of the same name.
#[derive(Default)]
pub struct MockRendezvous {
    rooms: Mutex<HashMap<RoomId, TransportId>>,
    registrations: Mutex<Vec<(RoomId, TransportId)>>,
    compare_and_swap: bool,
    unreachable: AtomicBool,
    hidden_lookups: AtomicUsize,
}

impl MockRendezvous {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compare_and_swap() -> Self {
        Self {
            compare_and_swap: true,
            ..Default::default()
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// The next `n` lookups report an empty room whatever is bound, as if
    /// another client registered right after them.
    pub fn hide_next_lookups(&self, n: usize) {
        self.hidden_lookups.store(n, Ordering::SeqCst);
    }

    pub fn bind(&self, room_id: &RoomId, host: &TransportId) {
        self.rooms
            .lock()
            .unwrap()
            .insert(room_id.clone(), host.clone());
    }

    pub fn host_of(&self, room_id: &RoomId) -> Option<TransportId> {
        self.rooms.lock().unwrap().get(room_id).cloned()
    }

    pub fn registrations(&self) -> Vec<(RoomId, TransportId)> {
        self.registrations.lock().unwrap().clone()
    }

    fn check_reachable(&self) -> Result<(), RendezvousError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(RendezvousError::Network("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RendezvousClient for MockRendezvous {
    async fn lookup(&self, room_id: &RoomId) -> Result<Option<TransportId>, RendezvousError> {
        self.check_reachable()?;
        let hidden = self
            .hidden_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hidden {
            return Ok(None);
        }
        Ok(self.host_of(room_id))
    }

    async fn register(
        &self,
        room_id: &RoomId,
        transport_id: &TransportId,
    ) -> Result<bool, RendezvousError> {
        self.check_reachable()?;
        self.registrations
            .lock()
            .unwrap()
            .push((room_id.clone(), transport_id.clone()));

        let mut rooms = self.rooms.lock().unwrap();
        if self.compare_and_swap
            && rooms
                .get(room_id)
                .is_some_and(|bound| bound != transport_id)
        {
            return Ok(false);
        }
        rooms.insert(room_id.clone(), transport_id.clone());
        Ok(true)
    }
}
