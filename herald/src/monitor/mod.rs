//! Live-stream detection: the in-memory live set and the polling scheduler.

pub mod live_state;
pub mod poller;

pub use live_state::LiveStateTracker;
pub use poller::{LiveStreamSource, PollerConfig, StreamPoller};
