mod memory;
mod redis;
pub mod sample;
pub mod watch;

pub use self::memory::MemoryHistoryStore;
pub use self::redis::RedisHistoryStore;
pub use self::watch::Subscription;

use async_trait::async_trait;
use log::info;
use std::error::Error;
use std::sync::Arc;
use thiserror::Error;
use crate::cli::Args;
use crate::models::chat::{ Conversation, Message, NewMessage };

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation '{0}' not found")]
    NotFound(String),
    #[error("conversation title must not be empty")]
    InvalidTitle,
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored document is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Conversations keyed by owner, newest first; messages keyed by
/// conversation, oldest first. Every write is pushed to live subscribers.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn create_conversation(
        &self,
        owner_id: &str,
        title: &str
    ) -> Result<Conversation, StoreError>;

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, StoreError>;

    async fn list_conversations(&self, owner_id: &str) -> Result<Vec<Conversation>, StoreError>;

    async fn rename_conversation(
        &self,
        conversation_id: &str,
        title: &str
    ) -> Result<Conversation, StoreError>;

    /// Removes the conversation together with its messages.
    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), StoreError>;

    async fn add_message(&self, message: NewMessage) -> Result<Message, StoreError>;

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError>;

    async fn subscribe(
        &self,
        conversation_id: &str
    ) -> Result<Subscription<Message>, StoreError>;

    async fn subscribe_conversations(
        &self,
        owner_id: &str
    ) -> Result<Subscription<Conversation>, StoreError>;
}

/// Newest first; stable on equal timestamps.
pub(crate) fn sort_newest_first(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Preview shown in conversation lists.
pub(crate) fn preview(content: &str) -> String {
    const PREVIEW_LEN: usize = 120;
    let line = content.lines().next().unwrap_or_default().trim();
    if line.chars().count() > PREVIEW_LEN {
        let cut: String = line.chars().take(PREVIEW_LEN).collect();
        format!("{}…", cut)
    } else {
        line.to_string()
    }
}

pub fn create_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    match args.history_type.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(MemoryHistoryStore::new())),
        "redis" => {
            let store = Arc::new(
                RedisHistoryStore::new(&args.history_host, &args.history_redis_prefix)?
            );
            store.spawn_listener();
            Ok(store)
        }
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported history store type: {}", args.history_type)
                    )
                )
            ),
    }
}

pub fn initialize_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    if args.history_type.eq_ignore_ascii_case("memory") {
        info!("Chat history will be kept in memory only");
    } else {
        info!("Chat history will be stored in: {} at {}", args.history_type, args.history_host);
    }
    create_history_store(args)
}
