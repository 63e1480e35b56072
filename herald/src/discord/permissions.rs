//! Effective channel permission computation.
//!
//! The platform exposes raw permission bitsets on roles plus per-channel
//! overwrites; the effective value for a member is derived client-side.
//! Order matters: base roles, then the everyone overwrite, then aggregated
//! role overwrites, then the member overwrite. Administrator short-circuits
//! everything.

use std::collections::HashSet;

pub const ADMINISTRATOR: u64 = 1 << 3;
pub const VIEW_CHANNEL: u64 = 1 << 10;
pub const SEND_MESSAGES: u64 = 1 << 11;
pub const MANAGE_MESSAGES: u64 = 1 << 13;
pub const READ_MESSAGE_HISTORY: u64 = 1 << 16;

/// Overwrite target kind as encoded on the wire.
pub const OVERWRITE_ROLE: u8 = 0;
pub const OVERWRITE_MEMBER: u8 = 1;

/// A single channel permission overwrite.
#[derive(Debug, Clone)]
pub struct Overwrite {
    pub target_id: i64,
    pub kind: u8,
    pub allow: u64,
    pub deny: u64,
}

/// The permission subset the daemon acts on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelPermissions {
    pub view_channel: bool,
    pub send_messages: bool,
    pub manage_messages: bool,
    pub read_message_history: bool,
}

impl ChannelPermissions {
    pub fn from_bits(bits: u64) -> Self {
        Self {
            view_channel: bits & VIEW_CHANNEL != 0,
            send_messages: bits & SEND_MESSAGES != 0,
            manage_messages: bits & MANAGE_MESSAGES != 0,
            read_message_history: bits & READ_MESSAGE_HISTORY != 0,
        }
    }

    /// Everything channel maintenance needs: see the channel, page its
    /// history, delete other users' messages.
    pub fn can_purge(&self) -> bool {
        self.view_channel && self.read_message_history && self.manage_messages
    }

    /// Names of the purge-relevant permissions currently missing.
    pub fn missing_for_purge(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.view_channel {
            missing.push("View Channel");
        }
        if !self.read_message_history {
            missing.push("Read Message History");
        }
        if !self.manage_messages {
            missing.push("Manage Messages");
        }
        missing
    }
}

/// Effective permission bits for a member in one channel.
///
/// `everyone_role_id` is the guild id; `role_perms` holds the raw bitsets of
/// the member's roles (the everyone role included by the caller).
pub fn effective_permissions(
    role_perms: &[u64],
    member_role_ids: &HashSet<i64>,
    everyone_role_id: i64,
    member_id: i64,
    overwrites: &[Overwrite],
) -> u64 {
    let mut base: u64 = role_perms.iter().copied().fold(0, |acc, p| acc | p);
    if base & ADMINISTRATOR != 0 {
        return u64::MAX;
    }

    if let Some(ow) = overwrites
        .iter()
        .find(|ow| ow.kind == OVERWRITE_ROLE && ow.target_id == everyone_role_id)
    {
        base &= !ow.deny;
        base |= ow.allow;
    }

    let mut role_allow = 0u64;
    let mut role_deny = 0u64;
    for ow in overwrites {
        if ow.kind == OVERWRITE_ROLE
            && ow.target_id != everyone_role_id
            && member_role_ids.contains(&ow.target_id)
        {
            role_allow |= ow.allow;
            role_deny |= ow.deny;
        }
    }
    base &= !role_deny;
    base |= role_allow;

    if let Some(ow) = overwrites
        .iter()
        .find(|ow| ow.kind == OVERWRITE_MEMBER && ow.target_id == member_id)
    {
        base &= !ow.deny;
        base |= ow.allow;
    }

    base
}
