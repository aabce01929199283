pub use tandem_core::{RoomId, TransportId};

pub mod model {
    pub use tandem_core::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use tandem_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use tandem_client::*;

    use std::sync::Arc;

    /// Synthetic capture, WebRTC transport and HTTP rendezvous, all pointed at
    /// the server at `base_url`.
    pub fn headless_services(base_url: &str) -> anyhow::Result<SessionServices> {
        let rendezvous = HttpRendezvous::new(base_url)?;
        let transport = WebRtcTransport::new(WebRtcTransportConfig::for_server(base_url)?);
        Ok(SessionServices::new(
            Arc::new(SyntheticCapture::new()),
            Arc::new(transport),
            Arc::new(rendezvous),
        ))
    }
}
