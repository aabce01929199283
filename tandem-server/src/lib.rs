pub mod config;
pub mod error;
pub mod rendezvous;
pub mod server;
pub mod signaling;
pub mod store;

pub use config::*;
pub use error::*;
pub use rendezvous::*;
pub use server::*;
pub use signaling::*;
pub use store::*;
