//! Event layer connecting the bot team runtime to its listeners.
//!
//! - [`protocol`]: the typed `TeamEvent` wire format
//! - [`event_bus`]: flume-backed pub/sub fan-out

pub mod event_bus;
pub mod protocol;
