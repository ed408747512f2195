use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::watch::{ Hub, Subscription };
use super::{ preview, sort_newest_first, HistoryStore, StoreError };
use crate::models::chat::{
    next_timestamp,
    normalize_title,
    Conversation,
    Message,
    NewMessage,
};

#[derive(Default)]
struct State {
    conversations: HashMap<String, Conversation>,
    messages: HashMap<String, Vec<Message>>,
}

impl State {
    fn owned_by(&self, owner_id: &str) -> Vec<Conversation> {
        let mut owned: Vec<Conversation> = self.conversations
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        sort_newest_first(&mut owned);
        owned
    }

    fn messages_of(&self, conversation_id: &str) -> Vec<Message> {
        self.messages.get(conversation_id).cloned().unwrap_or_default()
    }
}

/// Process-local store. Writes hold the state lock while publishing so that
/// subscribers never miss a snapshot.
#[derive(Default)]
pub struct MemoryHistoryStore {
    state: RwLock<State>,
    messages_hub: Hub<Message>,
    conversations_hub: Hub<Conversation>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn create_conversation(
        &self,
        owner_id: &str,
        title: &str
    ) -> Result<Conversation, StoreError> {
        let title = normalize_title(title).ok_or(StoreError::InvalidTitle)?;
        let conversation = Conversation::new(owner_id, title);

        let mut state = self.state.write().await;
        state.conversations.insert(conversation.id.clone(), conversation.clone());
        state.messages.insert(conversation.id.clone(), Vec::new());
        self.conversations_hub.publish(owner_id, state.owned_by(owner_id)).await;
        debug!("Created conversation {} for {}", conversation.id, owner_id);
        Ok(conversation)
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, StoreError> {
        self.state
            .read().await
            .conversations.get(conversation_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))
    }

    async fn list_conversations(&self, owner_id: &str) -> Result<Vec<Conversation>, StoreError> {
        Ok(self.state.read().await.owned_by(owner_id))
    }

    async fn rename_conversation(
        &self,
        conversation_id: &str,
        title: &str
    ) -> Result<Conversation, StoreError> {
        let title = normalize_title(title).ok_or(StoreError::InvalidTitle)?;

        let mut state = self.state.write().await;
        let conversation = state.conversations
            .get_mut(conversation_id)
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))?;
        conversation.title = title;
        let renamed = conversation.clone();
        self.conversations_hub.publish(&renamed.owner_id, state.owned_by(&renamed.owner_id)).await;
        Ok(renamed)
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let removed = state.conversations
            .remove(conversation_id)
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))?;
        state.messages.remove(conversation_id);
        self.messages_hub.close(conversation_id, Vec::new()).await;
        self.conversations_hub.publish(&removed.owner_id, state.owned_by(&removed.owner_id)).await;
        debug!("Deleted conversation {}", conversation_id);
        Ok(())
    }

    async fn add_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let mut state = self.state.write().await;
        let conversation_id = message.conversation_id.clone();
        if !state.conversations.contains_key(&conversation_id) {
            return Err(StoreError::NotFound(conversation_id));
        }

        let thread = state.messages.entry(conversation_id.clone()).or_default();
        let stored = message.into_message(next_timestamp(thread.last()));
        thread.push(stored.clone());
        let snapshot = thread.clone();

        let owner_id = match state.conversations.get_mut(&conversation_id) {
            Some(conversation) => {
                conversation.last_message = Some(preview(&stored.content));
                conversation.timestamp = stored.timestamp.max(Utc::now());
                conversation.owner_id.clone()
            }
            None => {
                return Err(StoreError::NotFound(conversation_id));
            }
        };

        self.messages_hub.publish(&conversation_id, snapshot).await;
        self.conversations_hub.publish(&owner_id, state.owned_by(&owner_id)).await;
        Ok(stored)
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        let state = self.state.read().await;
        if !state.conversations.contains_key(conversation_id) {
            return Err(StoreError::NotFound(conversation_id.to_string()));
        }
        Ok(state.messages_of(conversation_id))
    }

    async fn subscribe(
        &self,
        conversation_id: &str
    ) -> Result<Subscription<Message>, StoreError> {
        let state = self.state.read().await;
        if !state.conversations.contains_key(conversation_id) {
            return Err(StoreError::NotFound(conversation_id.to_string()));
        }
        Ok(self.messages_hub.subscribe(conversation_id, state.messages_of(conversation_id)).await)
    }

    async fn subscribe_conversations(
        &self,
        owner_id: &str
    ) -> Result<Subscription<Conversation>, StoreError> {
        let state = self.state.read().await;
        Ok(self.conversations_hub.subscribe(owner_id, state.owned_by(owner_id)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Sender;

    #[tokio::test]
    async fn messages_come_back_oldest_first() {
        let store = MemoryHistoryStore::new();
        let chat = store.create_conversation("u1", "Tokyo").await.unwrap();
        for text in ["one", "two", "three"] {
            store.add_message(NewMessage::user(&chat.id, text)).await.unwrap();
        }

        let messages = store.list_messages(&chat.id).await.unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert!(messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn conversations_are_per_owner_newest_first() {
        let store = MemoryHistoryStore::new();
        let older = store.create_conversation("u1", "Paris").await.unwrap();
        let newer = store.create_conversation("u1", "Rome").await.unwrap();
        store.create_conversation("u2", "Dubai").await.unwrap();

        // A new message bumps the older conversation to the top.
        store.add_message(NewMessage::user(&older.id, "Louvre hours?")).await.unwrap();

        let listed = store.list_conversations("u1").await.unwrap();
        let ids: Vec<_> = listed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![older.id.as_str(), newer.id.as_str()]);
        assert_eq!(listed[0].last_message.as_deref(), Some("Louvre hours?"));
    }

    #[tokio::test]
    async fn unknown_conversation_rejects_messages() {
        let store = MemoryHistoryStore::new();
        let err = store.add_message(NewMessage::ai("missing", "hi")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn rename_trims_and_validates() {
        let store = MemoryHistoryStore::new();
        let chat = store.create_conversation("u1", "Trip").await.unwrap();
        let renamed = store.rename_conversation(&chat.id, "  Sydney Beach  ").await.unwrap();
        assert_eq!(renamed.title, "Sydney Beach");
        assert!(matches!(
            store.rename_conversation(&chat.id, " ").await,
            Err(StoreError::InvalidTitle)
        ));
        assert!(matches!(store.create_conversation("u1", "").await, Err(StoreError::InvalidTitle)));
    }

    #[tokio::test]
    async fn delete_removes_messages_and_ends_subscriptions() {
        let store = MemoryHistoryStore::new();
        let chat = store.create_conversation("u1", "London").await.unwrap();
        store.add_message(NewMessage::user(&chat.id, "hi")).await.unwrap();
        let mut sub = store.subscribe(&chat.id).await.unwrap();

        store.delete_conversation(&chat.id).await.unwrap();
        assert_eq!(sub.next().await, Some(Vec::new()));
        assert_eq!(sub.next().await, None);
        assert!(store.list_messages(&chat.id).await.is_err());
        assert!(store.list_conversations("u1").await.unwrap().is_empty());
        assert!(matches!(store.delete_conversation(&chat.id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn subscribers_get_a_snapshot_per_write() {
        let store = MemoryHistoryStore::new();
        let chat = store.create_conversation("u1", "Maldives").await.unwrap();
        let mut sub = store.subscribe(&chat.id).await.unwrap();
        assert!(sub.snapshot().is_empty());

        store.add_message(NewMessage::user(&chat.id, "Best month?")).await.unwrap();
        let first = sub.next().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].sender, Sender::User);

        store.add_message(NewMessage::ai(&chat.id, "November to April.")).await.unwrap();
        let second = sub.next().await.unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[1].sender, Sender::Ai);
    }

    #[tokio::test]
    async fn conversation_list_subscription_follows_creates() {
        let store = MemoryHistoryStore::new();
        let mut sub = store.subscribe_conversations("u1").await.unwrap();
        store.create_conversation("u1", "Rome").await.unwrap();
        let listed = sub.next().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Rome");
    }
}
