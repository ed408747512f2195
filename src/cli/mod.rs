use clap::Parser;

use crate::llm::{ LlmConfig, LlmType, ParseLlmTypeError };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- History Store Args ---
    /// Conversation store type (memory, redis)
    #[arg(long, env = "HISTORY_TYPE", default_value = "memory")]
    pub history_type: String,

    /// Conversation store host endpoint (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "HISTORY_HOST", default_value = "redis://127.0.0.1:6379")]
    pub history_host: String,

    /// Prefix for Redis conversation keys.
    #[arg(long, env = "HISTORY_REDIS_PREFIX", default_value = "orbit:")]
    pub history_redis_prefix: String,

    /// Owner that gets the sample Tokyo trip at startup if they have no conversations.
    #[arg(long, env = "SAMPLE_OWNER")]
    pub sample_owner: Option<String>,

    // --- Chat LLM Provider Args ---
    /// Completion provider (openrouter, openai)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openrouter")]
    pub chat_llm_type: String,

    /// Base URL of the provider API (e.g., https://openrouter.ai/api/v1)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, the provider default applies if None
    pub chat_base_url: Option<String>,

    /// API Key for the completion provider.
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Fallback API key when CHAT_API_KEY is empty.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: Option<String>,

    /// Model name for chat completion (e.g., openai/gpt-4o-mini)
    #[arg(long, env = "CHAT_MODEL")] // No default, the provider default applies if None
    pub chat_model: Option<String>,

    /// Value of the HTTP-Referer header sent to the provider.
    #[arg(long, env = "CHAT_REFERER", default_value = "https://orbit-react-native.web.app")]
    pub chat_referer: String,

    /// Value of the X-Title header sent to the provider.
    #[arg(long, env = "CHAT_TITLE", default_value = "Orbit Travel Assistant")]
    pub chat_title: String,

    // --- Relay Args ---
    /// Where the message relay gets replies from: `direct` calls the provider
    /// in-process, `proxy` goes through the proxy endpoint at PROXY_URL.
    #[arg(long, env = "RELAY_MODE", default_value = "direct")]
    pub relay_mode: String,

    /// Proxy endpoint used when RELAY_MODE=proxy.
    #[arg(long, env = "PROXY_URL", default_value = "http://127.0.0.1:4000/generateAIResponse")]
    pub proxy_url: String,

    // --- General App Args ---
    /// Optional JSON file overriding the system prompt and the apology text.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    /// CHAT_API_KEY, else OPENROUTER_API_KEY.
    pub fn effective_api_key(&self) -> Option<String> {
        Some(self.chat_api_key.clone())
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.openrouter_api_key.clone().filter(|k| !k.trim().is_empty()))
    }

    pub fn chat_llm_config(&self) -> Result<LlmConfig, ParseLlmTypeError> {
        let llm_type: LlmType = self.chat_llm_type.parse()?;
        Ok(LlmConfig {
            llm_type,
            api_key: self.effective_api_key(),
            completion_model: self.chat_model.clone(),
            base_url: self.chat_base_url.clone(),
            referer: Some(self.chat_referer.clone()),
            title: Some(self.chat_title.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_key_wins_over_openrouter_key() {
        let args = Args::parse_from([
            "orbit-chat",
            "--chat-api-key",
            "primary",
            "--openrouter-api-key",
            "fallback",
        ]);
        assert_eq!(args.effective_api_key().as_deref(), Some("primary"));

        let args = Args::parse_from(["orbit-chat", "--chat-api-key", " ", "--openrouter-api-key", "fallback"]);
        assert_eq!(args.effective_api_key().as_deref(), Some("fallback"));
    }

    #[test]
    fn llm_config_carries_attribution_headers() {
        let args = Args::parse_from(["orbit-chat", "--chat-llm-type", "openai", "--chat-api-key", "k"]);
        let config = args.chat_llm_config().unwrap();
        assert_eq!(config.llm_type, LlmType::OpenAI);
        assert_eq!(config.title.as_deref(), Some("Orbit Travel Assistant"));

        let args = Args::parse_from(["orbit-chat", "--chat-llm-type", "ollama"]);
        assert!(args.chat_llm_config().is_err());
    }
}
