//! Task records and topic encoding for the gateway bridge

pub mod messages;
pub mod topics;

pub use messages::*;
pub use topics::{TopicCodec, TopicError, READ_DIRECTION, WRITE_DIRECTION};
