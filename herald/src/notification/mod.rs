//! Outbound notifications: embed rendering, fan-out dispatch, operator
//! alerts.

pub mod alerts;
pub mod dispatcher;
pub mod embeds;

pub use alerts::{AlertKind, OperatorAlerter};
pub use dispatcher::NotificationDispatcher;
