//! Self-service role menus: storage-facing CRUD plus the pure logic
//! that turns a member's pick into role grants and revocations. The
//! gateway collaborator renders menus and applies the computed diff.

pub mod selection;
pub mod service;

pub use selection::{SelectionDiff, apply_selection};
pub use service::{MAX_MENU_ENTRIES, RoleMenuService};
