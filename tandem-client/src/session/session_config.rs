use crate::media::{MediaCapture, MediaConstraints};
use crate::rendezvous::RendezvousClient;
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub constraints: MediaConstraints,

    /// How long a host waits for the other participant. `None` waits forever.
    pub await_peer_timeout: Option<Duration>,

    /// How long negotiation may take before remote media arrives.
    pub connect_timeout: Option<Duration>,
}

/// Capabilities a session drives.
#[derive(Clone)]
pub struct SessionServices {
    pub media: Arc<dyn MediaCapture>,
    pub transport: Arc<dyn Transport>,
    pub rendezvous: Arc<dyn RendezvousClient>,
}

impl SessionServices {
    pub fn new(
        media: Arc<dyn MediaCapture>,
        transport: Arc<dyn Transport>,
        rendezvous: Arc<dyn RendezvousClient>,
    ) -> Self {
        Self {
            media,
            transport,
            rendezvous,
        }
    }
}
