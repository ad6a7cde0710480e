use async_trait::async_trait;
use log::{ debug, info, warn };
use serde::Deserialize;
use std::error::Error;
use std::sync::Arc;

use crate::config::prompt::{ self, PromptConfig };
use crate::history::format_history_for_prompt;
use crate::llm::chat::ChatClient;
use crate::models::api::ChatOptions;
use crate::models::chat::{ ChatMessage, Role };
use crate::rag::rag::RagEngine;
use crate::response;
use crate::tools::query_engine::QueryEngineTool;
use crate::tools::{ describe_tools, Tool };

const MAX_OBSERVATION_CHARS: usize = 2000;
const NO_OBSERVATIONS: &str = "None yet.";

/// Produces raw model answers for the HTTP handlers. Implementations are
/// stateless: the caller owns the conversation history.
#[async_trait]
pub trait ChatEngine: Send + Sync {
    async fn query(&self, text: &str) -> Result<String, Box<dyn Error + Send + Sync>>;

    async fn chat(
        &self,
        history: &[ChatMessage],
        latest: &str,
        options: &ChatOptions
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default, alias = "query")]
    pub input: String,
}

/// Pulls the first JSON object out of a tool selection reply, ignoring any
/// reasoning trace or prose around it.
pub fn parse_tool_call(reply: &str) -> Option<ToolCall> {
    let visible = response::remove_trace(reply);
    let start = visible.find('{')?;
    let end = visible.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&visible[start..=end]).ok()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

pub struct RagAgent {
    rag: Arc<RagEngine>,
    chat_client: Arc<dyn ChatClient>,
    prompt_config: Arc<PromptConfig>,
    tools: Vec<Arc<dyn Tool>>,
    system_prompt: Option<String>,
    max_steps: usize,
}

impl RagAgent {
    pub fn new(
        rag: Arc<RagEngine>,
        chat_client: Arc<dyn ChatClient>,
        prompt_config: Arc<PromptConfig>,
        tools: Vec<Arc<dyn Tool>>,
        system_prompt: Option<String>,
        max_steps: usize
    ) -> Self {
        Self {
            rag,
            chat_client,
            prompt_config,
            tools,
            system_prompt: system_prompt.filter(|s| !s.trim().is_empty()),
            max_steps,
        }
    }

    /// History to forward to the model and the system prompt to send with it.
    /// A request override replaces both the configured prompt and any system
    /// message already in the history.
    fn prepare_history(
        &self,
        history: &[ChatMessage],
        options: &ChatOptions
    ) -> (Vec<ChatMessage>, Option<String>) {
        if let Some(system) = &options.system_prompt {
            let turns = history
                .iter()
                .filter(|m| m.role != Role::System)
                .cloned()
                .collect();
            return (turns, Some(system.clone()));
        }
        let has_system = history.iter().any(|m| m.role == Role::System);
        let system = if has_system { None } else { self.system_prompt.clone() };
        (history.to_vec(), system)
    }

    async fn standalone_question(
        &self,
        history: &[ChatMessage],
        latest: &str
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let chat_history = format_history_for_prompt(history);
        if chat_history.is_empty() {
            return Ok(latest.to_string());
        }
        let condense_prompt = prompt::get_condense_prompt(&self.prompt_config, &chat_history, latest)?;
        let condensed = self.chat_client.complete(&condense_prompt).await?;
        let question = response::remove_trace(&condensed).trim().to_string();
        if question.is_empty() {
            warn!("Condensed question came back empty, using the message as is");
            return Ok(latest.to_string());
        }
        debug!("Condensed '{}' into '{}'", latest, question);
        Ok(question)
    }

    async fn context_chat(
        &self,
        history: Vec<ChatMessage>,
        system: Option<String>,
        latest: &str,
        top_k: Option<usize>
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let question = self.standalone_question(&history, latest).await?;
        let hits = self.rag.retrieve(&question, top_k).await?;
        let context = RagEngine::format_context(&hits);
        let context_system = prompt::get_context_system_prompt(&self.prompt_config, &context)?;
        let system = match system {
            Some(base) => format!("{}\n\n{}", base.trim(), context_system),
            None => context_system,
        };

        let mut messages = history;
        messages.push(ChatMessage::user(latest));
        self.chat_client.chat(Some(&system), &messages).await
    }

    async fn tool_chat(
        &self,
        history: Vec<ChatMessage>,
        system: Option<String>,
        latest: &str,
        top_k: Option<usize>
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let mut tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(QueryEngineTool::new(Arc::clone(&self.rag), top_k))
        ];
        tools.extend(self.tools.iter().cloned());
        let described = describe_tools(&tools);
        let chat_history = format_history_for_prompt(&history);
        let mut observations: Vec<String> = Vec::new();

        for step in 1..=self.max_steps {
            let rendered = if observations.is_empty() {
                NO_OBSERVATIONS.to_string()
            } else {
                observations.join("\n\n")
            };
            let selection_prompt = prompt::get_tool_selection_prompt(
                &self.prompt_config,
                &described,
                &chat_history,
                &rendered,
                latest
            )?;
            let reply = self.chat_client
                .chat(system.as_deref(), &[ChatMessage::user(selection_prompt)]).await?;

            let Some(call) = parse_tool_call(&reply) else {
                warn!("Step {}: no tool call in model reply, stopping", step);
                break;
            };
            if call.tool.eq_ignore_ascii_case("none") {
                debug!("Step {}: model has enough information", step);
                break;
            }
            let Some(tool) = tools.iter().find(|t| t.name() == call.tool) else {
                warn!("Step {}: model picked unknown tool '{}', stopping", step, call.tool);
                break;
            };

            info!("Step {}: calling tool '{}' with '{}'", step, call.tool, call.input);
            let observation = match tool.call(&call.input).await {
                Ok(output) => truncate_chars(&output, MAX_OBSERVATION_CHARS),
                Err(e) => {
                    warn!("Tool '{}' failed: {}", call.tool, e);
                    format!("Tool failed: {}", e)
                }
            };
            observations.push(format!("[{}] {}\n{}", call.tool, call.input, observation));
        }

        if observations.is_empty() {
            info!("No tool observations, answering from the index");
            return self.context_chat(history, system, latest, top_k).await;
        }

        let answer_prompt = prompt::get_agent_answer_prompt(
            &self.prompt_config,
            &observations.join("\n\n"),
            latest
        )?;
        let mut messages = history;
        messages.push(ChatMessage::user(answer_prompt));
        self.chat_client.chat(system.as_deref(), &messages).await
    }
}

#[async_trait]
impl ChatEngine for RagAgent {
    async fn query(&self, text: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        self.rag.query_and_answer(text, None).await
    }

    async fn chat(
        &self,
        history: &[ChatMessage],
        latest: &str,
        options: &ChatOptions
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let (history, system) = self.prepare_history(history, options);
        let use_tools = options.use_tools.unwrap_or(true) && !self.tools.is_empty();
        if use_tools && self.max_steps > 0 {
            self.tool_chat(history, system, latest, options.top_k).await
        } else {
            self.context_chat(history, system, latest, options.top_k).await
        }
    }
}
