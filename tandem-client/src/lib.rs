pub mod media;
pub mod rendezvous;
pub mod session;
pub mod transport;

pub use media::*;
pub use rendezvous::*;
pub use session::*;
pub use transport::*;
