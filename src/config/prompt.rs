use once_cell::sync::Lazy;
use regex::{ Captures, Regex };
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use log::{ info, warn };
use thiserror::Error as ThisError;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid")
});

#[derive(Debug, ThisError)]
pub enum PromptError {
    #[error("Prompt template '{0}' not found")]
    TemplateNotFound(String),
    #[error("Failed to read prompts file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse prompts file '{path}': {source}")]
    JsonError {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

const CONDENSE_QUESTION: &str =
    "Given the conversation below and a follow-up message, rewrite the follow-up as a standalone question that keeps every detail needed to search a document index.\n\nConversation:\n{chat_history}\n\nFollow-up: {question}\n\nStandalone question:";

const TOOL_SELECTION: &str =
    "You can call the following tools:\n{tools}\n\nConversation so far:\n{chat_history}\n\nObservations gathered so far:\n{observations}\n\nQuestion: {question}\n\nIf another tool call would help, reply with JSON only: {\"tool\": \"<tool name>\", \"input\": \"<tool input>\"}. If you have enough information, reply with {\"tool\": \"none\"}.";

const RAG_ANSWER: &str =
    "Context information is below.\n---------------------\n{context}\n---------------------\nGiven the context information and not prior knowledge, answer the query.\nQuery: {question}\nAnswer:";

const CONTEXT_SYSTEM: &str =
    "Here are the relevant documents for the context:\n\n{context}\n\nInstruction: Based on the above documents, provide a detailed answer for the user question below.\nAnswer \"don't know\" if not present in the document.";

const AGENT_ANSWER: &str =
    "Use the observations below, collected with your tools, to answer the question.\n\nObservations:\n{observations}\n\nQuestion: {question}\nAnswer:";

#[derive(Deserialize, Debug, Clone)]
pub struct PromptConfig {
    #[serde(default)]
    pub query_templates: HashMap<String, String>,
    #[serde(default)]
    pub response_templates: HashMap<String, String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        let query_templates = HashMap::from([
            ("condense_question".to_string(), CONDENSE_QUESTION.to_string()),
            ("tool_selection".to_string(), TOOL_SELECTION.to_string()),
        ]);
        let response_templates = HashMap::from([
            ("rag_answer".to_string(), RAG_ANSWER.to_string()),
            ("context_system".to_string(), CONTEXT_SYSTEM.to_string()),
            ("agent_answer".to_string(), AGENT_ANSWER.to_string()),
        ]);
        Self { query_templates, response_templates }
    }
}

impl PromptConfig {
    /// Fills templates missing from a file with the built-in ones.
    fn with_defaults(mut self) -> Self {
        let defaults = PromptConfig::default();
        for (key, value) in defaults.query_templates {
            self.query_templates.entry(key).or_insert(value);
        }
        for (key, value) in defaults.response_templates {
            self.response_templates.entry(key).or_insert(value);
        }
        self
    }
}

pub fn load_prompts(path: &str) -> Result<Arc<PromptConfig>, PromptError> {
    if !Path::new(path).exists() {
        warn!("Prompts file '{}' not found, using built-in templates", path);
        return Ok(Arc::new(PromptConfig::default()));
    }
    let file_content = fs
        ::read_to_string(path)
        .map_err(|source| PromptError::IoError { path: path.to_string(), source })?;
    let config: PromptConfig = serde_json
        ::from_str(&file_content)
        .map_err(|source| PromptError::JsonError { path: path.to_string(), source })?;
    info!("Loaded prompt templates from {}", path);
    Ok(Arc::new(config.with_defaults()))
}

/// Substitutes `{name}` placeholders in one pass, so substituted text is
/// never scanned again. Unknown placeholders are left as they are.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        values
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
            .unwrap_or_else(|| caps[0].to_string())
    }).into_owned()
}

fn get_query_template<'a>(config: &'a PromptConfig, key: &str) -> Result<&'a str, PromptError> {
    config.query_templates
        .get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| PromptError::TemplateNotFound(format!("query_templates:{}", key)))
}

fn get_response_template<'a>(config: &'a PromptConfig, key: &str) -> Result<&'a str, PromptError> {
    config.response_templates
        .get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| PromptError::TemplateNotFound(format!("response_templates:{}", key)))
}

pub fn get_condense_prompt(
    config: &PromptConfig,
    chat_history: &str,
    question: &str
) -> Result<String, PromptError> {
    let template = get_query_template(config, "condense_question")?;
    Ok(fill(template, &[("chat_history", chat_history), ("question", question)]))
}

pub fn get_tool_selection_prompt(
    config: &PromptConfig,
    tools: &str,
    chat_history: &str,
    observations: &str,
    question: &str
) -> Result<String, PromptError> {
    let template = get_query_template(config, "tool_selection")?;
    Ok(
        fill(
            template,
            &[
                ("tools", tools),
                ("chat_history", chat_history),
                ("observations", observations),
                ("question", question),
            ]
        )
    )
}

pub fn get_rag_answer_prompt(
    config: &PromptConfig,
    context: &str,
    question: &str
) -> Result<String, PromptError> {
    let template = get_response_template(config, "rag_answer")?;
    Ok(fill(template, &[("context", context), ("question", question)]))
}

pub fn get_context_system_prompt(
    config: &PromptConfig,
    context: &str
) -> Result<String, PromptError> {
    let template = get_response_template(config, "context_system")?;
    Ok(fill(template, &[("context", context)]))
}

pub fn get_agent_answer_prompt(
    config: &PromptConfig,
    observations: &str,
    question: &str
) -> Result<String, PromptError> {
    let template = get_response_template(config, "agent_answer")?;
    Ok(fill(template, &[("observations", observations), ("question", question)]))
}
