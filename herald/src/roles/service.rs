//! Role-menu configuration service.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::database::models::{MenuStyle, RoleMenu, RoleMenuEntry};
use crate::database::repositories::RoleMenuRepository;
use crate::{Error, Result};

/// Platform component limit on selectable entries per menu.
pub const MAX_MENU_ENTRIES: usize = 25;

/// Validated access to role menus.
pub struct RoleMenuService {
    menus: Arc<dyn RoleMenuRepository>,
}

impl RoleMenuService {
    pub fn new(menus: Arc<dyn RoleMenuRepository>) -> Self {
        Self { menus }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_menu(
        &self,
        guild_id: i64,
        channel_id: i64,
        title: &str,
        style: MenuStyle,
        only_add: bool,
        max_roles: Option<i64>,
        entries: &[RoleMenuEntry],
    ) -> Result<RoleMenu> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::validation("menu title is empty"));
        }
        validate_entries(entries)?;
        if let Some(max) = max_roles
            && !(1..=entries.len() as i64).contains(&max)
        {
            return Err(Error::validation(
                "max_roles must be between 1 and the number of entries",
            ));
        }
        let menu = self
            .menus
            .create(
                guild_id, channel_id, title, style, only_add, max_roles, entries,
            )
            .await?;
        info!(guild_id, menu_id = menu.id, title, "role menu created");
        Ok(menu)
    }

    pub async fn update_entries(&self, id: i64, entries: &[RoleMenuEntry]) -> Result<RoleMenu> {
        validate_entries(entries)?;
        self.menus.update_entries(id, entries).await?;
        self.menus.get(id).await
    }

    /// Record the message the gateway published this menu as.
    pub async fn published(&self, id: i64, message_id: i64) -> Result<()> {
        self.menus.set_message_id(id, message_id).await
    }

    pub async fn menu(&self, id: i64) -> Result<RoleMenu> {
        self.menus.get(id).await
    }

    pub async fn menus_for_guild(&self, guild_id: i64) -> Result<Vec<RoleMenu>> {
        self.menus.list_for_guild(guild_id).await
    }

    pub async fn delete_menu(&self, id: i64) -> Result<bool> {
        self.menus.delete(id).await
    }

    pub async fn guild_teardown(&self, guild_id: i64) -> Result<()> {
        self.menus.delete_guild(guild_id).await
    }
}

fn validate_entries(entries: &[RoleMenuEntry]) -> Result<()> {
    if entries.is_empty() {
        return Err(Error::validation("a menu needs at least one entry"));
    }
    if entries.len() > MAX_MENU_ENTRIES {
        return Err(Error::validation(format!(
            "a menu holds at most {MAX_MENU_ENTRIES} entries"
        )));
    }
    let mut seen = HashSet::new();
    for entry in entries {
        if entry.label.trim().is_empty() {
            return Err(Error::validation("entry labels must not be empty"));
        }
        if !seen.insert(entry.role_id) {
            return Err(Error::validation(format!(
                "role {} appears twice in the menu",
                entry.role_id
            )));
        }
    }
    Ok(())
}
