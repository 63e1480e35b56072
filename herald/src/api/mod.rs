//! Admin HTTP API.
//!
//! Everything the daemon can be told to do at runtime goes through here:
//! guild settings, subscriptions, birthdays, chat commands, role menus and
//! channel-maintenance configs, plus a health view of the background loops.

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{ApiServer, ApiServerConfig, AppState};
