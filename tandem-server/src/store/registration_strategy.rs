use crate::store::{RendezvousStore, StoreError};
use std::fmt;
use std::str::FromStr;
use tandem_core::{RoomId, TransportId};

/// How `POST /room/{id}` treats an already bound room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegistrationStrategy {
    /// Overwrite whatever is bound. Two clients racing on an empty room can
    /// both believe they are host; the later registration silently wins.
    #[default]
    LastWriteWins,

    /// Only bind a vacant room (or re-bind the same identity). The loser of a
    /// race gets `success: false` and is expected to look up again.
    CompareAndSwap,
}

impl RegistrationStrategy {
    pub async fn register(
        &self,
        store: &dyn RendezvousStore,
        room_id: RoomId,
        transport_id: TransportId,
    ) -> Result<bool, StoreError> {
        match self {
            RegistrationStrategy::LastWriteWins => {
                store.register(room_id, transport_id).await?;
                Ok(true)
            }
            RegistrationStrategy::CompareAndSwap => {
                store.register_if_vacant(room_id, transport_id).await
            }
        }
    }
}

impl FromStr for RegistrationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-write-wins" | "lww" => Ok(RegistrationStrategy::LastWriteWins),
            "compare-and-swap" | "cas" => Ok(RegistrationStrategy::CompareAndSwap),
            other => Err(format!(
                "expected 'last-write-wins' or 'compare-and-swap', got '{}'",
                other
            )),
        }
    }
}

impl fmt::Display for RegistrationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationStrategy::LastWriteWins => write!(f, "last-write-wins"),
            RegistrationStrategy::CompareAndSwap => write!(f, "compare-and-swap"),
        }
    }
}
