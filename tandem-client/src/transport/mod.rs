mod media_call;
mod peer_transport;
pub mod rtc;

pub use media_call::*;
pub use peer_transport::*;
pub use rtc::{WebRtcEndpoint, WebRtcTransport, WebRtcTransportConfig};
