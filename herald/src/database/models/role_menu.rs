//! Role-menu database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A published self-service role menu.
///
/// `entries` is a JSON array of [`RoleMenuEntry`]; rendering and interaction
/// handling belong to the gateway collaborator, this side owns storage and
/// the selection logic.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RoleMenu {
    pub id: i64,
    pub guild_id: i64,
    pub channel_id: i64,
    /// Set once the gateway has published the menu message.
    pub message_id: Option<i64>,
    pub title: String,
    /// Stored as the lowercase style name.
    pub style: String,
    /// Selections may only grant roles, never revoke them.
    pub only_add: bool,
    /// Cap on simultaneously held roles from this menu.
    pub max_roles: Option<i64>,
    /// JSON array of entries
    pub entries: String,
    /// ISO 8601 timestamp
    pub created_at: String,
}

impl RoleMenu {
    pub fn parse_entries(&self) -> Result<Vec<RoleMenuEntry>, serde_json::Error> {
        serde_json::from_str(&self.entries)
    }

    pub fn menu_style(&self) -> MenuStyle {
        MenuStyle::parse(&self.style).unwrap_or(MenuStyle::Dropdown)
    }
}

/// One selectable role in a menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleMenuEntry {
    pub role_id: i64,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Menu presentation style.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MenuStyle {
    /// Multi-select; a pick replaces the full selection.
    Dropdown,
    /// One button per role; a press toggles that role.
    Buttons,
}

impl MenuStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dropdown => "dropdown",
            Self::Buttons => "buttons",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dropdown" => Some(Self::Dropdown),
            "buttons" => Some(Self::Buttons),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_round_trip() {
        let entries = vec![
            RoleMenuEntry {
                role_id: 1,
                label: "News".to_string(),
                emoji: Some("📰".to_string()),
                description: None,
            },
            RoleMenuEntry {
                role_id: 2,
                label: "Events".to_string(),
                emoji: None,
                description: Some("Event pings".to_string()),
            },
        ];
        let json = serde_json::to_string(&entries).unwrap();

        let menu = RoleMenu {
            id: 1,
            guild_id: 1,
            channel_id: 2,
            message_id: None,
            title: "Pick roles".to_string(),
            style: "dropdown".to_string(),
            only_add: false,
            max_roles: None,
            entries: json,
            created_at: String::new(),
        };
        assert_eq!(menu.parse_entries().unwrap(), entries);
        assert_eq!(menu.menu_style(), MenuStyle::Dropdown);
    }

    #[test]
    fn unknown_style_falls_back_to_dropdown() {
        assert_eq!(MenuStyle::parse("grid"), None);
        let menu = RoleMenu {
            id: 1,
            guild_id: 1,
            channel_id: 2,
            message_id: None,
            title: String::new(),
            style: "grid".to_string(),
            only_add: false,
            max_roles: None,
            entries: "[]".to_string(),
            created_at: String::new(),
        };
        assert_eq!(menu.menu_style(), MenuStyle::Dropdown);
    }
}
