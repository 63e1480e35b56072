//! Guild-facing configuration: subscriptions, notification settings,
//! live views and leaderboards. The operation surface the gateway
//! collaborator and the admin API both call.

pub mod service;

pub use service::{GuildConfigService, ImportReport, StreamerLookup};
