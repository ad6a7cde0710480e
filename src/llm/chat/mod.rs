use async_trait::async_trait;
use log::{ debug, info };
use rllm::{
    builder::LLMBuilder,
    chat::{ ChatMessage as LlmMessage, ChatRole, MessageType },
    LLMProvider,
};
use std::error::Error as StdError;
use std::sync::Arc;

use super::{ LlmConfig, LlmType };
use crate::models::chat::{ ChatMessage, Role };

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends an ordered message list. System messages in `messages` are
    /// merged into `system`, in order, since providers take one system prompt.
    async fn chat(
        &self,
        system: Option<&str>,
        messages: &[ChatMessage]
    ) -> Result<String, Box<dyn StdError + Send + Sync>>;

    async fn complete(&self, prompt: &str) -> Result<String, Box<dyn StdError + Send + Sync>> {
        self.chat(None, &[ChatMessage::user(prompt)]).await
    }
}

/// Joins the explicit system prompt with system messages found in history.
pub fn merge_system_prompt(system: Option<&str>, messages: &[ChatMessage]) -> Option<String> {
    let parts: Vec<&str> = system
        .into_iter()
        .chain(
            messages
                .iter()
                .filter(|m| m.role == Role::System)
                .map(|m| m.content.as_str())
        )
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

fn to_provider_messages(messages: &[ChatMessage]) -> Vec<LlmMessage> {
    messages
        .iter()
        .filter_map(|m| {
            let role = match m.role {
                Role::User => ChatRole::User,
                Role::Assistant => ChatRole::Assistant,
                Role::System => {
                    return None;
                }
            };
            Some(LlmMessage {
                role,
                content: m.content.clone(),
                message_type: MessageType::Text,
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct RllmChatClient {
    llm_type: LlmType,
    api_key: String,
    model: String,
    base_url: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl RllmChatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let client = Self {
            llm_type: config.llm_type,
            api_key: config.resolved_api_key()?,
            model: config.completion_model
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| config.llm_type.default_chat_model().to_string()),
            base_url: config.resolved_base_url(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };
        // validate the provider setup up front
        client.build_provider(None)?;
        Ok(client)
    }

    fn build_provider(
        &self,
        system: Option<&str>
    ) -> Result<Box<dyn LLMProvider>, Box<dyn StdError + Send + Sync>> {
        let mut builder = LLMBuilder::new()
            .backend(self.llm_type.backend())
            .api_key(self.api_key.clone())
            .model(&self.model)
            .stream(false);

        if let Some(url) = &self.base_url {
            builder = builder.base_url(url);
        }
        if let Some(tokens) = self.max_tokens {
            builder = builder.max_tokens(tokens);
        }
        if let Some(temp) = self.temperature {
            builder = builder.temperature(temp);
        }
        if let Some(system) = system {
            builder = builder.system(system);
        }

        Ok(builder.build()?)
    }
}

#[async_trait]
impl ChatClient for RllmChatClient {
    async fn chat(
        &self,
        system: Option<&str>,
        messages: &[ChatMessage]
    ) -> Result<String, Box<dyn StdError + Send + Sync>> {
        let system_prompt = merge_system_prompt(system, messages);
        let provider_messages = to_provider_messages(messages);
        if provider_messages.is_empty() {
            return Err("Chat request contains no user or assistant messages".into());
        }
        debug!(
            "RllmChatClient::chat() → type={} model={} messages={} system={}",
            self.llm_type,
            self.model,
            provider_messages.len(),
            system_prompt.is_some()
        );

        let provider = self.build_provider(system_prompt.as_deref())?;
        let resp = provider.chat(&provider_messages).await?;
        let text = resp
            .text()
            .map(|s| s.to_string())
            .unwrap_or_else(|| resp.to_string());
        Ok(text)
    }
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client = RllmChatClient::from_config(config)?;
    info!(
        "Chat client configured: Type={}, Model={}, BaseURL={}",
        config.llm_type,
        client.model,
        client.base_url.as_deref().unwrap_or("adapter default")
    );
    Ok(Arc::new(client))
}
