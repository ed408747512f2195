use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::sync::Arc;
use log::info;

pub const SYSTEM_PROMPT: &str =
    "You are a helpful travel assistant, providing detailed and personalized travel advice. \
Your responses should be informative yet concise, focusing on practical travel tips and recommendations.";

/// Persisted as the AI reply whenever a completion cannot be obtained.
pub const APOLOGY_MESSAGE: &str =
    "Sorry, I'm having trouble responding right now. Please try again in a moment.";

#[derive(Debug)]
pub enum PromptError {
    EmptyField(&'static str),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::EmptyField(key) => write!(f, "Prompt field '{}' must not be empty", key),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

fn default_system_prompt() -> String {
    SYSTEM_PROMPT.to_string()
}

fn default_apology_message() -> String {
    APOLOGY_MESSAGE.to_string()
}

/// Fixed texts used around a completion call. Either field can be overridden
/// from a JSON file; missing fields keep the built-in wording.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PromptConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_apology_message")]
    pub apology_message: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            apology_message: default_apology_message(),
        }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        if self.system_prompt.trim().is_empty() {
            return Err(PromptError::EmptyField("system_prompt"));
        }
        if self.apology_message.trim().is_empty() {
            return Err(PromptError::EmptyField("apology_message"));
        }
        Ok(())
    }
}

pub fn parse_prompts(raw: &str) -> Result<PromptConfig, PromptError> {
    let config: PromptConfig = serde_json::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

pub fn load_prompts(path: &str) -> Result<Arc<PromptConfig>, Box<dyn Error + Send + Sync>> {
    let file_content = fs
        ::read_to_string(path)
        .map_err(|e| format!("Failed to read prompts file '{}': {}", path, e))?;
    let config = parse_prompts(&file_content).map_err(|e|
        format!("Failed to parse prompts file '{}': {}", path, e)
    )?;
    info!("Loaded prompt overrides from: {}", path);
    Ok(Arc::new(config))
}

/// Loads overrides when a path is configured, otherwise the built-in prompts.
pub fn load_or_default(path: Option<&str>) -> Result<Arc<PromptConfig>, Box<dyn Error + Send + Sync>> {
    match path.filter(|p| !p.trim().is_empty()) {
        Some(p) => load_prompts(p),
        None => {
            info!("No prompts file configured, using built-in travel assistant prompt.");
            Ok(Arc::new(PromptConfig::default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = parse_prompts(r#"{"apology_message":"Oops, try again."}"#).unwrap();
        assert_eq!(config.system_prompt, SYSTEM_PROMPT);
        assert_eq!(config.apology_message, "Oops, try again.");
    }

    #[test]
    fn blank_fields_are_rejected() {
        let err = parse_prompts(r#"{"system_prompt":"   "}"#).unwrap_err();
        assert!(matches!(err, PromptError::EmptyField("system_prompt")));
    }

    #[test]
    fn no_path_means_defaults() {
        let config = load_or_default(None).unwrap();
        assert_eq!(*config, PromptConfig::default());
        assert!(load_or_default(Some("/definitely/not/here.json")).is_err());
    }
}
