//! Role-menu repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{MenuStyle, RoleMenu, RoleMenuEntry};
use crate::{Error, Result};

/// Role-menu repository trait.
#[async_trait]
pub trait RoleMenuRepository: Send + Sync {
    async fn create(
        &self,
        guild_id: i64,
        channel_id: i64,
        title: &str,
        style: MenuStyle,
        only_add: bool,
        max_roles: Option<i64>,
        entries: &[RoleMenuEntry],
    ) -> Result<RoleMenu>;
    async fn get(&self, id: i64) -> Result<RoleMenu>;
    /// Record the message the gateway published this menu as.
    async fn set_message_id(&self, id: i64, message_id: i64) -> Result<()>;
    async fn update_entries(&self, id: i64, entries: &[RoleMenuEntry]) -> Result<()>;
    async fn list_for_guild(&self, guild_id: i64) -> Result<Vec<RoleMenu>>;
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn delete_guild(&self, guild_id: i64) -> Result<()>;
}

/// SQLx implementation of RoleMenuRepository.
pub struct SqlxRoleMenuRepository {
    pool: SqlitePool,
}

impl SqlxRoleMenuRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleMenuRepository for SqlxRoleMenuRepository {
    async fn create(
        &self,
        guild_id: i64,
        channel_id: i64,
        title: &str,
        style: MenuStyle,
        only_add: bool,
        max_roles: Option<i64>,
        entries: &[RoleMenuEntry],
    ) -> Result<RoleMenu> {
        let entries_json = serde_json::to_string(entries)?;
        let menu = sqlx::query_as::<_, RoleMenu>(
            r#"
            INSERT INTO role_menus
                (guild_id, channel_id, title, style, only_add, max_roles, entries, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(guild_id)
        .bind(channel_id)
        .bind(title)
        .bind(style.as_str())
        .bind(only_add)
        .bind(max_roles)
        .bind(entries_json)
        .bind(chrono::Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(menu)
    }

    async fn get(&self, id: i64) -> Result<RoleMenu> {
        sqlx::query_as::<_, RoleMenu>("SELECT * FROM role_menus WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("RoleMenu", id.to_string()))
    }

    async fn set_message_id(&self, id: i64, message_id: i64) -> Result<()> {
        sqlx::query("UPDATE role_menus SET message_id = ? WHERE id = ?")
            .bind(message_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_entries(&self, id: i64, entries: &[RoleMenuEntry]) -> Result<()> {
        let entries_json = serde_json::to_string(entries)?;
        sqlx::query("UPDATE role_menus SET entries = ? WHERE id = ?")
            .bind(entries_json)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_for_guild(&self, guild_id: i64) -> Result<Vec<RoleMenu>> {
        let menus =
            sqlx::query_as::<_, RoleMenu>("SELECT * FROM role_menus WHERE guild_id = ? ORDER BY id")
                .bind(guild_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(menus)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM role_menus WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_guild(&self, guild_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM role_menus WHERE guild_id = ?")
            .bind(guild_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
