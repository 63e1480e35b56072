//! Pure role-selection logic.
//!
//! Given a menu, the member's current roles and a pick, computes which
//! roles to grant and revoke. Nothing here talks to the network.

use std::collections::HashSet;

use crate::database::models::{MenuStyle, RoleMenu};
use crate::{Error, Result};

/// Roles to grant and revoke for one selection, both sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionDiff {
    pub to_add: Vec<i64>,
    pub to_remove: Vec<i64>,
}

impl SelectionDiff {
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Apply a pick to a member's current roles.
///
/// Dropdown menus treat the pick as the full desired selection; button
/// menus toggle the single picked role. `only_add` menus never revoke,
/// and `max_roles` rejects picks that would leave the member holding
/// more menu roles than allowed. Roles outside the menu are never
/// touched.
pub fn apply_selection(
    menu: &RoleMenu,
    current_role_ids: &HashSet<i64>,
    picked_ids: &[i64],
) -> Result<SelectionDiff> {
    let entries = menu.parse_entries()?;
    let menu_roles: HashSet<i64> = entries.iter().map(|e| e.role_id).collect();

    if let Some(outside) = picked_ids.iter().find(|id| !menu_roles.contains(id)) {
        return Err(Error::validation(format!(
            "role {outside} is not part of this menu"
        )));
    }

    let held: HashSet<i64> = current_role_ids
        .intersection(&menu_roles)
        .copied()
        .collect();

    match menu.menu_style() {
        MenuStyle::Dropdown => dropdown_diff(menu, &held, picked_ids),
        MenuStyle::Buttons => toggle_diff(menu, &held, picked_ids),
    }
}

fn dropdown_diff(menu: &RoleMenu, held: &HashSet<i64>, picked: &[i64]) -> Result<SelectionDiff> {
    let desired: HashSet<i64> = picked.iter().copied().collect();

    let kept = if menu.only_add {
        held.union(&desired).count()
    } else {
        desired.len()
    };
    if let Some(max) = menu.max_roles
        && kept as i64 > max
    {
        return Err(Error::validation(format!("menu allows at most {max} roles")));
    }

    let mut to_add: Vec<i64> = desired.difference(held).copied().collect();
    let mut to_remove: Vec<i64> = if menu.only_add {
        Vec::new()
    } else {
        held.difference(&desired).copied().collect()
    };
    to_add.sort_unstable();
    to_remove.sort_unstable();
    Ok(SelectionDiff { to_add, to_remove })
}

fn toggle_diff(menu: &RoleMenu, held: &HashSet<i64>, picked: &[i64]) -> Result<SelectionDiff> {
    let [role_id] = picked else {
        return Err(Error::validation("button menus toggle exactly one role"));
    };
    if held.contains(role_id) {
        if menu.only_add {
            return Ok(SelectionDiff::default());
        }
        return Ok(SelectionDiff {
            to_add: Vec::new(),
            to_remove: vec![*role_id],
        });
    }
    if let Some(max) = menu.max_roles
        && held.len() as i64 + 1 > max
    {
        return Err(Error::validation(format!("menu allows at most {max} roles")));
    }
    Ok(SelectionDiff {
        to_add: vec![*role_id],
        to_remove: Vec::new(),
    })
}
