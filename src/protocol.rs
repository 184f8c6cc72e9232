//! Wire protocol of the assistant backend
//!
//! - `event` - the closed set of events a streamed reply can carry
//! - `frame` - incremental line parser turning raw fragments into events
//! - `wire` - request/response bodies of the REST endpoints

mod event;
mod frame;
mod wire;

#[cfg(test)]
mod proptests;

pub use event::StreamEvent;
pub use frame::{FrameParser, DATA_PREFIX, DONE_SENTINEL};
pub use wire::*;
