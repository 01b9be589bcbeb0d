//! Delivery of bus messages onto a connection.

pub mod backlog;
pub mod frame;
pub mod stream;
pub mod transport;
pub mod writer;

pub use backlog::BacklogReplayer;
pub use frame::{Outbound, frame_event};
pub use stream::StreamRelay;
pub use transport::{EventStream, EventStreamTransport, FrameTransport};
pub use writer::ConnectionWriter;
