mod memory_store;
mod registration_strategy;
mod rendezvous_store;

pub use memory_store::*;
pub use registration_strategy::*;
pub use rendezvous_store::*;
