pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    OpenRouter,
    OpenAI,
}

impl LlmType {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmType::OpenRouter => "https://openrouter.ai/api/v1",
            LlmType::OpenAI => "https://api.openai.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmType::OpenRouter => "openai/gpt-4o-mini",
            LlmType::OpenAI => "gpt-4o-mini",
        }
    }
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmType::OpenRouter => write!(f, "openrouter"),
            LlmType::OpenAI => write!(f, "openai"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}
impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openrouter" => Ok(LlmType::OpenRouter),
            "openai" => Ok(LlmType::OpenAI),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    /// Sent as `HTTP-Referer`; OpenRouter uses it for app attribution.
    pub referer: Option<String>,
    /// Sent as `X-Title`.
    pub title: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::OpenRouter,
            api_key: None,
            completion_model: None,
            base_url: None,
            referer: None,
            title: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_types_case_insensitively() {
        assert_eq!("OpenRouter".parse::<LlmType>(), Ok(LlmType::OpenRouter));
        assert_eq!(" openai ".parse::<LlmType>(), Ok(LlmType::OpenAI));
        assert!("ollama".parse::<LlmType>().is_err());
    }

    #[test]
    fn openrouter_defaults() {
        assert_eq!(LlmType::OpenRouter.default_base_url(), "https://openrouter.ai/api/v1");
        assert_eq!(LlmType::OpenRouter.default_model(), "openai/gpt-4o-mini");
        assert_eq!(LlmType::OpenRouter.to_string(), "openrouter");
    }
}
