use crate::config::prompt::PromptConfig;
use crate::history::HistoryStore;
use crate::llm::chat::{ complete_with_system, ChatClient };
use crate::models::chat::{ Message, NewMessage };

use async_trait::async_trait;
use log::{ info, warn, error };
use std::error::Error;
use std::sync::Arc;

/// Produces an AI reply for a user message in a conversation.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(
        &self,
        message: &str,
        chat_id: &str
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Calls the completion API in-process with the configured system prompt,
/// the same exchange the proxy endpoint performs.
pub struct DirectResponder {
    client: Arc<dyn ChatClient>,
    prompts: Arc<PromptConfig>,
}

impl DirectResponder {
    pub fn new(client: Arc<dyn ChatClient>, prompts: Arc<PromptConfig>) -> Self {
        Self { client, prompts }
    }
}

#[async_trait]
impl Responder for DirectResponder {
    async fn respond(
        &self,
        message: &str,
        _chat_id: &str
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        complete_with_system(self.client.as_ref(), &self.prompts.system_prompt, message).await
    }
}

/// What a send wrote. Callers render from the store subscription; this is for
/// logging and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendOutcome {
    pub user_message: Option<Message>,
    pub ai_message: Option<Message>,
    /// The completion failed and the apology was written instead.
    pub fell_back: bool,
}

pub struct MessageRelay {
    store: Arc<dyn HistoryStore>,
    responder: Arc<dyn Responder>,
    apology: String,
}

impl MessageRelay {
    pub fn new(store: Arc<dyn HistoryStore>, responder: Arc<dyn Responder>, apology: String) -> Self {
        Self { store, responder, apology }
    }

    /// Persists the user message, asks for one completion and persists the
    /// reply (or the apology when the completion fails). Returns `None` for
    /// blank text. Store failures are logged, never returned.
    pub async fn send(&self, conversation_id: &str, text: &str) -> Option<SendOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let mut outcome = SendOutcome::default();
        match self.store.add_message(NewMessage::user(conversation_id, text)).await {
            Ok(stored) => {
                outcome.user_message = Some(stored);
            }
            Err(e) => {
                // Without a stored user message there is nothing to reply to.
                error!("Failed to store user message in {}: {}", conversation_id, e);
                return Some(outcome);
            }
        }

        let reply = match self.responder.respond(text, conversation_id).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Completion failed for {}: {}", conversation_id, e);
                outcome.fell_back = true;
                self.apology.clone()
            }
        };

        match self.store.add_message(NewMessage::ai(conversation_id, &reply)).await {
            Ok(stored) => {
                info!(
                    "Relayed message in {} ({} chars reply{})",
                    conversation_id,
                    stored.content.chars().count(),
                    if outcome.fell_back { ", apology" } else { "" }
                );
                outcome.ai_message = Some(stored);
            }
            Err(e) => {
                error!("Failed to store AI reply in {}: {}", conversation_id, e);
            }
        }

        Some(outcome)
    }
}
