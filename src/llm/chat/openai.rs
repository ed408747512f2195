use async_trait::async_trait;
use log::{ debug, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;

use super::{ ChatClient, CompletionResponse, PromptMessage };
use crate::llm::LlmConfig;

/// Client for any OpenAI compatible `/chat/completions` endpoint
/// (OpenAI itself, OpenRouter).
pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

/// Text of the first choice. An answer without choices or content counts as a
/// failed completion.
fn first_choice_text(body: &str) -> Result<String, Box<dyn StdError + Send + Sync>> {
    let parsed: OpenAIResponse = serde_json
        ::from_str(body)
        .map_err(|e| format!("Failed to parse completion response: {}", e))?;
    parsed.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.is_empty())
        .ok_or_else(|| "Completion response contained no content".into())
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        referer: Option<String>,
        title: Option<String>
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| format!("Invalid API key format: {}", e))?
        );
        if let Some(referer) = referer.filter(|r| !r.is_empty()) {
            headers.insert(
                HeaderName::from_static("http-referer"),
                HeaderValue::from_str(&referer).map_err(|e| format!("Invalid referer: {}", e))?
            );
        }
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            headers.insert(
                HeaderName::from_static("x-title"),
                HeaderValue::from_str(&title).map_err(|e| format!("Invalid title: {}", e))?
            );
        }

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;

        Ok(Self {
            http,
            model,
            base_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| format!("An API key is required for the {} provider", config.llm_type))?;
        let model = config.completion_model
            .clone()
            .unwrap_or_else(|| config.llm_type.default_model().to_string());
        let base_url = config.base_url
            .clone()
            .unwrap_or_else(|| config.llm_type.default_base_url().to_string());

        info!("Completion endpoint: {} (model {})", completions_url(&base_url), model);
        Self::new(api_key, model, base_url, config.referer.clone(), config.title.clone())
    }
}

/// Accepts either an API root (`.../v1`) or the full completions URL.
fn completions_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/chat/completions") {
        trimmed.to_string()
    } else {
        format!("{}/chat/completions", trimmed)
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(
        &self,
        messages: &[PromptMessage]
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        let url = completions_url(&self.base_url);
        let req = OpenAIChatRequest {
            model: &self.model,
            messages,
        };
        debug!("Sending {} messages to {}", messages.len(), url);

        let resp = self.http.post(&url).json(&req).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(format!("Completion request failed with status {}: {}", status, body).into());
        }

        let response = first_choice_text(&body)?;
        Ok(CompletionResponse { response })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmType;

    #[test]
    fn completions_url_handles_both_forms() {
        assert_eq!(
            completions_url("https://openrouter.ai/api/v1/"),
            "https://openrouter.ai/api/v1/chat/completions"
        );
        assert_eq!(
            completions_url("http://localhost:9000/v1/chat/completions"),
            "http://localhost:9000/v1/chat/completions"
        );
    }

    #[test]
    fn picks_first_choice() {
        let body =
            r#"{"choices":[{"message":{"role":"assistant","content":"Visit Kyoto."}},
            {"message":{"role":"assistant","content":"ignored"}}]}"#;
        assert_eq!(first_choice_text(body).unwrap(), "Visit Kyoto.");
    }

    #[test]
    fn no_choices_or_null_content_is_an_error() {
        assert!(first_choice_text(r#"{"choices":[]}"#).is_err());
        assert!(first_choice_text(r#"{"choices":[{"message":{"content":null}}]}"#).is_err());
        assert!(first_choice_text("<html>").is_err());
    }

    #[test]
    fn request_body_shape() {
        let messages = [PromptMessage::system("sys"), PromptMessage::user("hi")];
        let req = OpenAIChatRequest { model: "openai/gpt-4o-mini", messages: &messages };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "openai/gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn config_requires_api_key_and_fills_defaults() {
        let mut config = LlmConfig::default();
        assert!(OpenAIChatClient::from_config(&config).is_err());

        config.api_key = Some("sk-test".into());
        config.referer = Some("https://orbit.example".into());
        config.title = Some("Orbit Travel Assistant".into());
        let client = OpenAIChatClient::from_config(&config).unwrap();
        assert_eq!(client.get_model(), LlmType::OpenRouter.default_model());
        assert_eq!(client.get_base_url().as_deref(), Some(LlmType::OpenRouter.default_base_url()));
    }
}
