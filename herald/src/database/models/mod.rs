//! Database models.
//!
//! These models map directly to the database schema and handle
//! serialization/deserialization of JSON fields.

pub mod birthday;
pub mod chat;
pub mod cleanup;
pub mod guild;
pub mod notification;
pub mod role_menu;
pub mod stream_event;
pub mod subscription;

pub use birthday::*;
pub use chat::*;
pub use cleanup::*;
pub use guild::*;
pub use notification::*;
pub use role_menu::*;
pub use stream_event::*;
pub use subscription::*;
