//! Helix: typed async client for the streaming platform's HTTP API.
//!
//! Wraps the app-token lifecycle (client-credentials exchange, cached bearer,
//! refresh ahead of expiry) and the read endpoints the bot needs:
//!
//! - batched live-stream lookup with profile-image enrichment
//! - user lookup by login or id
//! - channel info by broadcaster id
//! - archive videos (for last-broadcast queries)
//!
//! All responses are parsed into owned value types at the API boundary;
//! callers never see raw JSON.

pub mod auth;
pub mod client;
pub mod error;
pub mod models;

pub use auth::AppTokenManager;
pub use client::{HelixClient, MAX_LOOKUP_BATCH};
pub use error::{HelixError, Result};
pub use models::{ChannelInfo, LastStreamInfo, StreamRecord, UserRecord, VideoRecord};
