//! Repository layer: one trait per table, sqlx/SQLite implementations.

pub mod birthday;
pub mod chat;
pub mod cleanup;
pub mod guild_settings;
pub mod notification;
pub mod role_menu;
pub mod stream_event;
pub mod subscription;

pub use birthday::*;
pub use chat::*;
pub use cleanup::*;
pub use guild_settings::*;
pub use notification::*;
pub use role_menu::*;
pub use stream_event::*;
pub use subscription::*;
