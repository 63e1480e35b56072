//! Client for the streaming platform's chat service (IRC over WebSocket).
//!
//! ## Core Types
//!
//! - [`TmiConnection`] - An authenticated connection that can join channels,
//!   send messages, and stream incoming lines
//! - [`ChatMessage`] - A parsed chat message with sender badges
//! - [`ServerMessage`] - Any parsed server line (chat, joins, notices,
//!   reconnect requests)
//!
//! Connection supervision (reconnects, channel re-joins) is left to the
//! caller; the server's `RECONNECT` request surfaces as an error from
//! [`TmiConnection::next_chat_message`] so the caller can cycle.

pub mod connection;
pub mod error;
pub mod message;

pub use connection::{CHAT_SERVER_URL, TmiConnection, normalize_token};
pub use error::{Result, TmiError};
pub use message::{ChatMessage, ServerMessage, normalize_channel, parse_line};
