mod init;
mod spans;
mod stream_id;

pub use init::init_logger;
pub use spans::{child_span, stream_span};
pub use stream_id::StreamId;
