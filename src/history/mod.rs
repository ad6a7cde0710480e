use log::{ debug, info };
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{ Mutex, OwnedMutexGuard, RwLock };

use crate::models::chat::{ ChatMessage, Role };

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("chat history '{0}' not found")]
    NotFound(String),
}

type Messages = Arc<Mutex<Vec<ChatMessage>>>;

/// In-memory chat histories keyed by conversation id.
///
/// Every conversation sits behind its own mutex, so operations on different
/// ids never wait on each other while operations on the same id are applied
/// one at a time. Nothing is persisted.
///
/// A conversation exists once it holds a message. The map slot a turn opens
/// for an unseen id stays invisible if that turn is rolled back.
#[derive(Default)]
pub struct ConversationStore {
    conversations: RwLock<HashMap<String, Messages>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lookup(&self, id: &str) -> Option<Messages> {
        self.conversations.read().await.get(id).cloned()
    }

    async fn get_or_create(&self, id: &str) -> Messages {
        if let Some(existing) = self.lookup(id).await {
            return existing;
        }
        let mut conversations = self.conversations.write().await;
        conversations
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!("Creating empty history for chat '{}'", id);
                Arc::new(Mutex::new(Vec::new()))
            })
            .clone()
    }

    /// Replaces any history for `id` with a single system message.
    pub async fn init(&self, id: &str, system_prompt: &str) {
        let entry = self.get_or_create(id).await;
        let mut messages = entry.lock().await;
        if !messages.is_empty() {
            info!("Re-initializing chat '{}', dropping {} messages", id, messages.len());
        }
        *messages = vec![ChatMessage::system(system_prompt)];
    }

    pub async fn append_user(&self, id: &str, text: &str) {
        let entry = self.get_or_create(id).await;
        entry.lock().await.push(ChatMessage::user(text));
    }

    pub async fn append_assistant(&self, id: &str, text: &str) -> Result<(), HistoryError> {
        let entry = self.lookup(id).await.ok_or_else(|| HistoryError::NotFound(id.to_string()))?;
        let mut messages = entry.lock().await;
        if messages.is_empty() {
            return Err(HistoryError::NotFound(id.to_string()));
        }
        messages.push(ChatMessage::assistant(text));
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Vec<ChatMessage>, HistoryError> {
        let entry = self.lookup(id).await.ok_or_else(|| HistoryError::NotFound(id.to_string()))?;
        let messages = entry.lock().await;
        if messages.is_empty() {
            return Err(HistoryError::NotFound(id.to_string()));
        }
        Ok(messages.clone())
    }

    /// Locks the conversation for one user/assistant exchange, creating it
    /// when unseen. Other operations on `id` wait until the turn is dropped.
    /// A turn dropped with its user message unanswered is rolled back.
    pub async fn begin_turn(&self, id: &str) -> ConversationTurn {
        let entry = self.get_or_create(id).await;
        let guard = entry.lock_owned().await;
        ConversationTurn {
            id: id.to_string(),
            messages: guard,
            pending_user: false,
        }
    }
}

pub struct ConversationTurn {
    id: String,
    messages: OwnedMutexGuard<Vec<ChatMessage>>,
    pending_user: bool,
}

impl ConversationTurn {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push_user(&mut self, text: &str) {
        self.messages.push(ChatMessage::user(text));
        self.pending_user = true;
    }

    pub fn push_assistant(&mut self, text: &str) {
        self.messages.push(ChatMessage::assistant(text));
        self.pending_user = false;
    }

    /// Undoes the user message of a turn that produced no answer.
    pub fn rollback(&mut self) {
        if self.pending_user && self.messages.last().map(|m| m.role) == Some(Role::User) {
            self.messages.pop();
            debug!("Rolled back unanswered user message in chat '{}'", self.id);
        }
        self.pending_user = false;
    }
}

impl Drop for ConversationTurn {
    fn drop(&mut self) {
        if self.pending_user {
            info!("Chat turn for '{}' ended without an answer", self.id);
            self.rollback();
        }
    }
}

/// Renders prior turns as `User: ...` / `Assistant: ...` lines for prompts.
/// System messages are left out.
pub fn format_history_for_prompt(messages: &[ChatMessage]) -> String {
    let mut result = String::new();
    for msg in messages {
        let role_display = match msg.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => {
                continue;
            }
        };
        result.push_str(&format!("{}: {}\n", role_display, msg.content));
    }
    result.trim_end().to_string()
}
