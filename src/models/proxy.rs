use serde::{ Serialize, Deserialize };

/// Body of a completion request sent to the proxy endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

impl GenerateRequest {
    pub fn new(message: &str, chat_id: &str) -> Self {
        Self {
            message: Some(message.to_string()),
            chat_id: Some(chat_id.to_string()),
        }
    }

    /// Lenient parse: an empty or malformed body yields a request with no
    /// fields, which then fails validation.
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    /// Returns `(message, chat_id)` when both are present and non-empty.
    pub fn fields(&self) -> Option<(&str, &str)> {
        let message = self.message.as_deref().filter(|m| !m.is_empty())?;
        let chat_id = self.chat_id.as_deref().filter(|c| !c.is_empty())?;
        Some((message, chat_id))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}
