//! Chat-relay side of the bot: an IRC-over-WebSocket connection to the
//! streaming platform, a command engine answering `!commands` in joined
//! channels, and the service layer that guild configuration talks to.

pub mod commands;
pub mod relay;
pub mod service;

pub use commands::{ChannelInfoSource, CommandEngine};
pub use relay::{ChatRelay, RelayCommand, RelayHandle, relay_channel};
pub use service::ChatService;
