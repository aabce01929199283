mod local_stream;
mod media_capture;
mod synthetic_capture;

pub use local_stream::*;
pub use media_capture::*;
pub use synthetic_capture::*;
