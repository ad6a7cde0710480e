pub mod duckduckgo;
pub mod query_engine;
pub mod wikipedia;

use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use thiserror::Error;

use crate::config::tools::ToolsConfig;
use self::duckduckgo::DuckDuckGoSearchTool;
use self::wikipedia::{ WikipediaClient, WikipediaLoadTool, WikipediaSearchTool };

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{service} returned status {status}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("{0}")]
    Engine(String),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn call(&self, input: &str) -> Result<String, ToolError>;
}

/// Instantiates the external tools enabled in the tools config.
pub fn load_tools(config: &ToolsConfig) -> Vec<Arc<dyn Tool>> {
    let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
    if config.is_empty() {
        info!("No external tools configured, the agent answers from the index only");
        return tools;
    }
    if let Some(ddg) = &config.duckduckgo {
        tools.push(Arc::new(DuckDuckGoSearchTool::new(&ddg.region, ddg.max_results)));
    }
    if let Some(wiki) = &config.wikipedia {
        let client = Arc::new(WikipediaClient::new(&wiki.lang));
        tools.push(Arc::new(WikipediaLoadTool::new(Arc::clone(&client))));
        tools.push(Arc::new(WikipediaSearchTool::new(client)));
    }
    for tool in &tools {
        info!("Loaded tool '{}'", tool.name());
    }
    tools
}

/// One `- name: description` line per tool, for prompts.
pub fn describe_tools(tools: &[Arc<dyn Tool>]) -> String {
    tools
        .iter()
        .map(|t| format!("- {}: {}", t.name(), t.description()))
        .collect::<Vec<_>>()
        .join("\n")
}
