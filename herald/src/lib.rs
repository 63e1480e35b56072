//! herald library crate.
//!
//! Live-stream notification daemon: polls the streaming platform for
//! subscribed streamers, announces going-live events to guild channels,
//! relays chat commands, and exposes an admin HTTP API.

pub mod api;
pub mod birthday;
pub mod chat;
pub mod cleanup;
pub mod config;
pub mod database;
pub mod discord;
pub mod error;
pub mod guilds;
pub mod heartbeat;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod panic_hook;
pub mod roles;
pub mod utils;

pub use config::AppConfig;
pub use error::{Error, Result};
