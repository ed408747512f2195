pub mod openai;

use async_trait::async_trait;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use std::sync::Arc;
use super::LlmConfig;
use self::openai::OpenAIChatClient;

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: ChatRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: &str) -> Self {
        Self { role: ChatRole::System, content: content.to_string() }
    }

    pub fn user(content: &str) -> Self {
        Self { role: ChatRole::User, content: content.to_string() }
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[PromptMessage]
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

/// One completion for a single user message under a fixed system instruction.
pub async fn complete_with_system(
    client: &dyn ChatClient,
    system_prompt: &str,
    message: &str
) -> Result<String, Box<dyn StdError + Send + Sync>> {
    let messages = [PromptMessage::system(system_prompt), PromptMessage::user(message)];
    let completion = client.complete(&messages).await?;
    Ok(completion.response)
}

/// Every supported provider speaks the OpenAI chat-completions dialect.
pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client = OpenAIChatClient::from_config(config)?;
    Ok(Arc::new(client))
}
