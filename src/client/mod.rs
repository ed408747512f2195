//! State behind the chat and history screens. Both views are fed only by
//! store snapshots; the one local addition is the optimistic copy of a
//! message the user just sent.

pub mod proxy;

pub use self::proxy::ProxyClient;

use chrono::Utc;
use std::collections::HashSet;

use crate::history::{ HistoryStore, StoreError, Subscription };
use crate::models::chat::{ sort_chronologically, Conversation, Message, NewMessage, Sender };
use crate::relay::{ MessageRelay, SendOutcome };

const PENDING_PREFIX: &str = "pending-";

pub struct ChatView {
    conversation_id: String,
    persisted: Vec<Message>,
    pending: Vec<Message>,
}

impl ChatView {
    pub fn new(conversation_id: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            persisted: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Shows `text` immediately, before the store has it.
    pub fn push_optimistic(&mut self, text: &str) -> Option<&Message> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let mut message = NewMessage::user(&self.conversation_id, text).into_message(Utc::now());
        message.id = format!("{}{}", PENDING_PREFIX, message.id);
        self.pending.push(message);
        self.pending.last()
    }

    /// Replaces the persisted list. A pending message is settled by the first
    /// stored user message with the same text that is not older than it.
    pub fn apply_snapshot(&mut self, mut snapshot: Vec<Message>) {
        sort_chronologically(&mut snapshot);

        let mut claimed = HashSet::new();
        self.pending.retain(|pending| {
            let settled = snapshot
                .iter()
                .enumerate()
                .find(|(i, m)| {
                    !claimed.contains(i) &&
                        m.sender == Sender::User &&
                        m.content == pending.content &&
                        m.timestamp >= pending.timestamp
                })
                .map(|(i, _)| i);
            match settled {
                Some(i) => {
                    claimed.insert(i);
                    false
                }
                None => true,
            }
        });
        self.persisted = snapshot;
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Messages in display order: non-decreasing timestamps.
    pub fn rendered(&self) -> Vec<Message> {
        let mut all: Vec<Message> = self.persisted
            .iter()
            .chain(self.pending.iter())
            .cloned()
            .collect();
        sort_chronologically(&mut all);
        all
    }

    /// Optimistic display followed by the relay round trip. The reply shows
    /// up through the subscription, not through the return value.
    pub async fn send(&mut self, relay: &MessageRelay, text: &str) -> Option<SendOutcome> {
        self.push_optimistic(text)?;
        relay.send(&self.conversation_id, text).await
    }

    /// Waits for the next snapshot. `false` once the conversation is gone.
    pub async fn follow(&mut self, subscription: &mut Subscription<Message>) -> bool {
        match subscription.next().await {
            Some(snapshot) => {
                self.apply_snapshot(snapshot);
                true
            }
            None => false,
        }
    }
}

/// The history screen: an owner's conversations, newest first.
#[derive(Default)]
pub struct ConversationList {
    items: Vec<Conversation>,
    hidden: HashSet<String>,
}

impl ConversationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_snapshot(&mut self, mut snapshot: Vec<Conversation>) {
        snapshot.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        self.hidden.retain(|id| snapshot.iter().any(|c| &c.id == id));
        self.items = snapshot;
    }

    /// Removes an entry from this view only; the store keeps it.
    pub fn hide(&mut self, conversation_id: &str) {
        self.hidden.insert(conversation_id.to_string());
    }

    /// Hides the entry and deletes it from the store. The entry comes back if
    /// the delete fails.
    pub async fn delete(
        &mut self,
        store: &dyn HistoryStore,
        conversation_id: &str
    ) -> Result<(), StoreError> {
        self.hide(conversation_id);
        let result = store.delete_conversation(conversation_id).await;
        if result.is_err() {
            self.hidden.remove(conversation_id);
        }
        result
    }

    pub fn visible(&self) -> Vec<&Conversation> {
        self.items
            .iter()
            .filter(|c| !self.hidden.contains(&c.id))
            .collect()
    }
}
