use serde::{ Serialize, Deserialize };

use super::chat::ChatMessage;

pub const MAX_TOP_K: usize = 50;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub chat_id: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatEmptyRequest {
    pub content: String,
    pub system: String,
}

#[derive(Debug, Deserialize)]
pub struct InitChatRequest {
    pub chat_id: String,
    pub system: String,
}

/// Visible answer plus the reasoning trace the model emitted, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResponse {
    #[serde(rename = "--response--")]
    pub response: String,
    #[serde(rename = "--think--")]
    pub think: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InitChatResponse {
    pub message: String,
    pub chat_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(rename = "--history--")]
    pub history: Vec<ChatMessage>,
}

/// Per-request knobs accepted by `/api/chat/request`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatOptions {
    /// Number of chunks retrieved from the index.
    pub top_k: Option<usize>,
    /// Set to false to answer from the index only, even when tools are loaded.
    pub use_tools: Option<bool>,
    /// Overrides the configured system prompt for this request.
    pub system_prompt: Option<String>,
}

impl ChatOptions {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(top_k) = self.top_k {
            if top_k == 0 || top_k > MAX_TOP_K {
                return Err(format!("top_k must be between 1 and {}, got {}", MAX_TOP_K, top_k));
            }
        }
        if let Some(prompt) = &self.system_prompt {
            if prompt.trim().is_empty() {
                return Err("system_prompt must not be blank".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatData {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub data: Option<ChatOptions>,
}

impl ChatData {
    /// Splits the payload into prior history and the latest message text.
    pub fn split_last(&self) -> Option<(&[ChatMessage], &str)> {
        let (last, history) = self.messages.split_last()?;
        Some((history, last.content.as_str()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResult {
    pub result: ChatMessage,
}
