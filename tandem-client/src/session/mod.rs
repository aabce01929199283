mod attempt;
mod call_session;
mod connection_state;
mod session_config;
mod session_driver;
mod session_error;

pub use call_session::*;
pub use connection_state::*;
pub use session_config::*;
pub use session_error::*;
