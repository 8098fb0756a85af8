//! dialang-capture: asynchronous data capture.
//!
//! [`ChannelSink`] plugs into the engine as its event sink and hands every
//! event to a background task, which appends them in batches to a
//! [`CaptureStore`]. Store failures are logged there and never reach the
//! engine.

pub mod sink;
pub mod store;

pub use sink::{spawn_writer, CaptureWriter, ChannelSink, WriterStats};
pub use store::{CaptureRecord, CaptureStore, JsonlStore, MemoryStore};
