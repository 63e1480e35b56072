//! Message cleanup: offline notification removal and scheduled channel
//! maintenance.

pub mod channels;
pub mod offline;

pub use channels::ChannelMaintenance;
pub use offline::OfflineCleanup;
