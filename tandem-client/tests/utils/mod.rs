pub mod mock_rendezvous;
pub mod mock_transport;

pub use dropping_broker::*;
pub use mock_capture::*;
pub use mock_rendezvous::*;
pub use mock_transport::*;
pub use test_server::*;
