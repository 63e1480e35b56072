//! Recording [`MessagingClient`] double shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::discord::{
    ChannelPermissions, ChannelRecord, DeleteOutcome, MessageRecord, MessageRef, MessagingClient,
    OutgoingMessage, UserIdentity,
};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub channel_id: i64,
    pub message: OutgoingMessage,
}

/// In-memory client that records every call and can be told to fail sends
/// per channel or return fixed delete outcomes per message.
pub struct RecordingClient {
    pub sent: Mutex<Vec<SentMessage>>,
    pub deleted: Mutex<Vec<(i64, i64)>>,
    pub bulk_deleted: Mutex<Vec<(i64, Vec<i64>)>>,
    pub fail_sends_to: Mutex<HashSet<i64>>,
    pub delete_outcomes: Mutex<HashMap<(i64, i64), DeleteOutcome>>,
    pub permissions: Mutex<HashMap<i64, ChannelPermissions>>,
    pub messages: Mutex<HashMap<i64, Vec<MessageRecord>>>,
    next_message_id: AtomicI64,
}

impl Default for RecordingClient {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            bulk_deleted: Mutex::new(Vec::new()),
            fail_sends_to: Mutex::new(HashSet::new()),
            delete_outcomes: Mutex::new(HashMap::new()),
            permissions: Mutex::new(HashMap::new()),
            messages: Mutex::new(HashMap::new()),
            next_message_id: AtomicI64::new(5000),
        }
    }
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_sends_to(self, channel_id: i64) -> Self {
        self.fail_sends_to.lock().insert(channel_id);
        self
    }

    pub fn sent_to(&self, channel_id: i64) -> Vec<SentMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

const ALL_PERMS: ChannelPermissions = ChannelPermissions {
    view_channel: true,
    send_messages: true,
    manage_messages: true,
    read_message_history: true,
};

#[async_trait]
impl MessagingClient for RecordingClient {
    async fn current_user(&self) -> Result<UserIdentity> {
        Ok(UserIdentity {
            id: 1,
            username: "herald-test".to_string(),
        })
    }

    async fn get_channel(&self, channel_id: i64) -> Result<Option<ChannelRecord>> {
        Ok(Some(ChannelRecord {
            id: channel_id,
            name: Some(format!("channel-{channel_id}")),
            guild_id: Some(1),
        }))
    }

    async fn send_message(&self, channel_id: i64, message: &OutgoingMessage) -> Result<MessageRef> {
        if self.fail_sends_to.lock().contains(&channel_id) {
            return Err(Error::messaging(format!("send to {channel_id} refused")));
        }
        self.sent.lock().push(SentMessage {
            channel_id,
            message: message.clone(),
        });
        Ok(MessageRef {
            channel_id,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn delete_message(&self, channel_id: i64, message_id: i64) -> Result<DeleteOutcome> {
        self.deleted.lock().push((channel_id, message_id));
        Ok(self
            .delete_outcomes
            .lock()
            .get(&(channel_id, message_id))
            .copied()
            .unwrap_or(DeleteOutcome::Deleted))
    }

    async fn bulk_delete(&self, channel_id: i64, message_ids: &[i64]) -> Result<()> {
        self.bulk_deleted
            .lock()
            .push((channel_id, message_ids.to_vec()));
        Ok(())
    }

    async fn list_messages(
        &self,
        channel_id: i64,
        before: Option<i64>,
        limit: u8,
    ) -> Result<Vec<MessageRecord>> {
        let all = self.messages.lock();
        let mut page: Vec<MessageRecord> = all
            .get(&channel_id)
            .map(|m| m.as_slice())
            .unwrap_or_default()
            .iter()
            .filter(|m| before.is_none_or(|b| m.id < b))
            .cloned()
            .collect();
        page.sort_by_key(|m| std::cmp::Reverse(m.id));
        page.truncate(limit as usize);
        Ok(page)
    }

    async fn channel_permissions(&self, channel_id: i64) -> Result<ChannelPermissions> {
        Ok(self
            .permissions
            .lock()
            .get(&channel_id)
            .copied()
            .unwrap_or(ALL_PERMS))
    }

    async fn create_dm(&self, user_id: i64) -> Result<i64> {
        Ok(900_000 + user_id)
    }

    fn bulk_delete_max_age(&self) -> chrono::Duration {
        chrono::Duration::days(14) - chrono::Duration::minutes(10)
    }
}
