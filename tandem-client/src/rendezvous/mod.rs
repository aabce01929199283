mod http_rendezvous;
mod rendezvous_client;

pub use http_rendezvous::*;
pub use rendezvous_client::*;
