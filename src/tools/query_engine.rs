use async_trait::async_trait;
use std::sync::Arc;

use super::{ Tool, ToolError };
use crate::rag::rag::RagEngine;

pub const QUERY_TOOL_NAME: &str = "query_index";

/// Exposes the document index to the agent as a tool.
pub struct QueryEngineTool {
    engine: Arc<RagEngine>,
    top_k: Option<usize>,
}

impl QueryEngineTool {
    pub fn new(engine: Arc<RagEngine>, top_k: Option<usize>) -> Self {
        Self { engine, top_k }
    }
}

#[async_trait]
impl Tool for QueryEngineTool {
    fn name(&self) -> &str {
        QUERY_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Use this tool to retrieve information from the indexed documents. Input: a standalone question."
    }

    async fn call(&self, input: &str) -> Result<String, ToolError> {
        self.engine
            .query_and_answer(input, self.top_k).await
            .map_err(|e| ToolError::Engine(e.to_string()))
    }
}
