mod rendezvous;
mod room;
mod signaling;
mod transport;

pub use rendezvous::{LookupResponse, RegisterRequest, RegisterResponse};
pub use room::RoomId;
pub use signaling::{CallId, IceServerConfig, SignalMessage};
pub use transport::TransportId;
