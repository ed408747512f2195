use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use log::{ error, info, warn };
use redis::{ Client, AsyncCommands };
use serde::{ de::DeserializeOwned, Deserialize, Serialize };
use std::sync::{ Arc, Weak };
use std::time::Duration;
use tokio::sync::Mutex;

use super::watch::{ Hub, Subscription };
use super::{ preview, sort_newest_first, HistoryStore, StoreError };
use crate::models::chat::{
    next_timestamp,
    normalize_title,
    sort_chronologically,
    Conversation,
    Message,
    NewMessage,
};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// What a write touched. Published on `<prefix>changes` so every instance
/// sharing the database refreshes its own subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Change {
    Conversations {
        owner_id: String,
    },
    Messages {
        conversation_id: String,
        owner_id: String,
    },
    Deleted {
        conversation_id: String,
        owner_id: String,
    },
}

/// Layout under the configured prefix:
/// `conversation:<id>` JSON document, `owner:<owner>` set of conversation ids,
/// `messages:<id>` list of JSON messages, `changes` pub/sub channel.
pub struct RedisHistoryStore {
    client: Client,
    key_prefix: String,
    // Serializes writes, refreshes and subscriptions inside this process.
    gate: Mutex<()>,
    messages_hub: Hub<Message>,
    conversations_hub: Hub<Conversation>,
}

fn encode<T: Serialize>(value: &T) -> Result<String, StoreError> {
    Ok(serde_json::to_string(value)?)
}

fn decode_all<T: DeserializeOwned>(entries: &[String]) -> Vec<T> {
    let mut decoded = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_str::<T>(entry) {
            Ok(value) => decoded.push(value),
            Err(e) => error!("Error parsing stored entry: {}", e),
        }
    }
    decoded
}

/// Writers on other instances can append out of timestamp order.
fn decode_thread(entries: &[String]) -> Vec<Message> {
    let mut thread: Vec<Message> = decode_all(entries);
    sort_chronologically(&mut thread);
    thread
}

impl RedisHistoryStore {
    pub fn new(host: &str, key_prefix: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client: Client::open(host)?,
            key_prefix: key_prefix.to_string(),
            gate: Mutex::new(()),
            messages_hub: Hub::new(),
            conversations_hub: Hub::new(),
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    fn changes_channel(&self) -> String {
        format!("{}changes", self.key_prefix)
    }

    /// Starts the task that applies change notices from every instance to
    /// this instance's subscribers. It ends once the store is dropped.
    pub fn spawn_listener(self: &Arc<Self>) {
        let store = Arc::downgrade(self);
        let client = self.client.clone();
        let channel = self.changes_channel();
        tokio::spawn(async move {
            loop {
                match listen(&client, &channel, &store).await {
                    Ok(()) => {
                        if store.upgrade().is_none() {
                            break;
                        }
                        warn!("Change feed on {} closed, reconnecting", channel);
                    }
                    Err(e) => error!("Change feed on {} failed: {}", channel, e),
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
                if store.upgrade().is_none() {
                    break;
                }
            }
        });
    }

    /// Refreshes local subscribers from the database, then tells the other
    /// instances. The write itself has already succeeded, so a failed
    /// announcement is only logged.
    async fn announce(&self, conn: &mut redis::aio::MultiplexedConnection, change: Change) {
        if let Err(e) = self.refresh(conn, &change).await {
            error!("Failed to refresh subscribers after {:?}: {}", change, e);
        }
        let notice = match encode(&change) {
            Ok(notice) => notice,
            Err(e) => {
                error!("Failed to encode change {:?}: {}", change, e);
                return;
            }
        };
        let published: Result<(), redis::RedisError> = conn.publish(self.changes_channel(), notice).await;
        if let Err(e) = published {
            error!("Failed to publish change {:?}: {}", change, e);
        }
    }

    /// Reloads whatever `change` touched and pushes it to subscribers of this
    /// instance. Callers hold the gate.
    async fn refresh(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        change: &Change
    ) -> Result<(), StoreError> {
        let owner_id = match change {
            Change::Conversations { owner_id } => owner_id,
            Change::Messages { conversation_id, owner_id } => {
                if self.messages_hub.subscriber_count(conversation_id).await > 0 {
                    match self.load_conversation(conn, conversation_id).await {
                        Ok(_) => {
                            let thread = self.load_messages(conn, conversation_id).await?;
                            self.messages_hub.publish(conversation_id, thread).await;
                        }
                        Err(StoreError::NotFound(_)) => {
                            self.messages_hub.close(conversation_id, Vec::new()).await;
                        }
                        Err(e) => {
                            return Err(e);
                        }
                    }
                }
                owner_id
            }
            Change::Deleted { conversation_id, owner_id } => {
                self.messages_hub.close(conversation_id, Vec::new()).await;
                owner_id
            }
        };
        if self.conversations_hub.subscriber_count(owner_id).await > 0 {
            let owned = self.load_owned(conn, owner_id).await?;
            self.conversations_hub.publish(owner_id, owned).await;
        }
        Ok(())
    }

    fn conversation_key(&self, conversation_id: &str) -> String {
        format!("{}conversation:{}", self.key_prefix, conversation_id)
    }

    fn owner_key(&self, owner_id: &str) -> String {
        format!("{}owner:{}", self.key_prefix, owner_id)
    }

    fn messages_key(&self, conversation_id: &str) -> String {
        format!("{}messages:{}", self.key_prefix, conversation_id)
    }

    async fn load_conversation(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        conversation_id: &str
    ) -> Result<Conversation, StoreError> {
        let raw: Option<String> = conn.get(self.conversation_key(conversation_id)).await?;
        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(StoreError::NotFound(conversation_id.to_string())),
        }
    }

    async fn save_conversation(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        conversation: &Conversation
    ) -> Result<(), StoreError> {
        let _: () = conn.set(self.conversation_key(&conversation.id), encode(conversation)?).await?;
        Ok(())
    }

    async fn load_owned(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        owner_id: &str
    ) -> Result<Vec<Conversation>, StoreError> {
        let ids: Vec<String> = conn.smembers(self.owner_key(owner_id)).await?;
        let mut docs = Vec::with_capacity(ids.len());
        for id in &ids {
            let raw: Option<String> = conn.get(self.conversation_key(id)).await?;
            if let Some(json) = raw {
                docs.push(json);
            }
        }
        let mut owned: Vec<Conversation> = decode_all(&docs);
        sort_newest_first(&mut owned);
        Ok(owned)
    }

    async fn load_messages(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        conversation_id: &str
    ) -> Result<Vec<Message>, StoreError> {
        let entries: Vec<String> = conn.lrange(self.messages_key(conversation_id), 0, -1).await?;
        Ok(decode_thread(&entries))
    }
}

async fn listen(
    client: &Client,
    channel: &str,
    store: &Weak<RedisHistoryStore>
) -> Result<(), StoreError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    info!("Listening for conversation changes on {}", channel);

    let mut notices = Box::pin(pubsub.on_message());
    while let Some(msg) = notices.next().await {
        let Some(store) = store.upgrade() else {
            return Ok(());
        };
        let change = match
            msg
                .get_payload::<String>()
                .map_err(StoreError::from)
                .and_then(|raw| Ok(serde_json::from_str::<Change>(&raw)?))
        {
            Ok(change) => change,
            Err(e) => {
                warn!("Ignoring malformed change notice: {}", e);
                continue;
            }
        };

        let _guard = store.gate.lock().await;
        let mut conn = store.get_connection().await?;
        if let Err(e) = store.refresh(&mut conn, &change).await {
            error!("Failed to apply change {:?}: {}", change, e);
        }
    }
    Ok(())
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn create_conversation(
        &self,
        owner_id: &str,
        title: &str
    ) -> Result<Conversation, StoreError> {
        let title = normalize_title(title).ok_or(StoreError::InvalidTitle)?;
        let conversation = Conversation::new(owner_id, title);

        let _guard = self.gate.lock().await;
        let mut conn = self.get_connection().await?;
        self.save_conversation(&mut conn, &conversation).await?;
        let _: () = conn.sadd(self.owner_key(owner_id), &conversation.id).await?;

        self.announce(&mut conn, Change::Conversations { owner_id: owner_id.to_string() }).await;
        Ok(conversation)
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, StoreError> {
        let mut conn = self.get_connection().await?;
        self.load_conversation(&mut conn, conversation_id).await
    }

    async fn list_conversations(&self, owner_id: &str) -> Result<Vec<Conversation>, StoreError> {
        let mut conn = self.get_connection().await?;
        self.load_owned(&mut conn, owner_id).await
    }

    async fn rename_conversation(
        &self,
        conversation_id: &str,
        title: &str
    ) -> Result<Conversation, StoreError> {
        let title = normalize_title(title).ok_or(StoreError::InvalidTitle)?;

        let _guard = self.gate.lock().await;
        let mut conn = self.get_connection().await?;
        let mut conversation = self.load_conversation(&mut conn, conversation_id).await?;
        conversation.title = title;
        self.save_conversation(&mut conn, &conversation).await?;

        let change = Change::Conversations { owner_id: conversation.owner_id.clone() };
        self.announce(&mut conn, change).await;
        Ok(conversation)
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), StoreError> {
        let _guard = self.gate.lock().await;
        let mut conn = self.get_connection().await?;
        let conversation = self.load_conversation(&mut conn, conversation_id).await?;

        let _: () = conn.del(self.conversation_key(conversation_id)).await?;
        let _: () = conn.del(self.messages_key(conversation_id)).await?;
        let _: () = conn.srem(self.owner_key(&conversation.owner_id), conversation_id).await?;

        let change = Change::Deleted {
            conversation_id: conversation_id.to_string(),
            owner_id: conversation.owner_id,
        };
        self.announce(&mut conn, change).await;
        Ok(())
    }

    async fn add_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let _guard = self.gate.lock().await;
        let mut conn = self.get_connection().await?;
        let mut conversation = self.load_conversation(&mut conn, &message.conversation_id).await?;

        let thread = self.load_messages(&mut conn, &conversation.id).await?;
        let stored = message.into_message(next_timestamp(thread.last()));
        let _: () = conn.rpush(self.messages_key(&conversation.id), encode(&stored)?).await?;

        conversation.last_message = Some(preview(&stored.content));
        conversation.timestamp = stored.timestamp.max(Utc::now());
        self.save_conversation(&mut conn, &conversation).await?;

        let change = Change::Messages {
            conversation_id: conversation.id.clone(),
            owner_id: conversation.owner_id.clone(),
        };
        self.announce(&mut conn, change).await;
        Ok(stored)
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        let mut conn = self.get_connection().await?;
        self.load_conversation(&mut conn, conversation_id).await?;
        self.load_messages(&mut conn, conversation_id).await
    }

    async fn subscribe(
        &self,
        conversation_id: &str
    ) -> Result<Subscription<Message>, StoreError> {
        let _guard = self.gate.lock().await;
        let mut conn = self.get_connection().await?;
        self.load_conversation(&mut conn, conversation_id).await?;
        let thread = self.load_messages(&mut conn, conversation_id).await?;
        Ok(self.messages_hub.subscribe(conversation_id, thread).await)
    }

    async fn subscribe_conversations(
        &self,
        owner_id: &str
    ) -> Result<Subscription<Conversation>, StoreError> {
        let _guard = self.gate.lock().await;
        let mut conn = self.get_connection().await?;
        let owned = self.load_owned(&mut conn, owner_id).await?;
        Ok(self.conversations_hub.subscribe(owner_id, owned).await)
    }
}
