use crate::config::prompt::{ self, PromptConfig };
use crate::llm::chat::ChatClient;
use crate::llm::embedding::EmbeddingClient;
use crate::rag::index::{ ScoredChunk, VectorStore };

use log::{ debug, info };
use std::fmt;
use std::{ error::Error as StdError, sync::Arc };

#[derive(Debug)]
pub struct RagEngineError(pub String);

impl fmt::Display for RagEngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RagEngine Error: {}", self.0)
    }
}

impl StdError for RagEngineError {}

#[derive(Clone)]
pub struct RagEngine {
    vector_store: Arc<dyn VectorStore>,
    chat_client: Arc<dyn ChatClient>,
    embedding_client: Arc<dyn EmbeddingClient>,
    prompt_config: Arc<PromptConfig>,
    default_limit: usize,
}

impl RagEngine {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        chat_client: Arc<dyn ChatClient>,
        embedding_client: Arc<dyn EmbeddingClient>,
        prompt_config: Arc<PromptConfig>,
        default_limit: usize
    ) -> Self {
        Self {
            vector_store,
            chat_client,
            embedding_client,
            prompt_config,
            default_limit,
        }
    }

    pub fn format_context(hits: &[ScoredChunk]) -> String {
        if hits.is_empty() {
            return "No relevant documents found.".to_string();
        }

        let mut docs_text = String::new();
        for hit in hits {
            docs_text.push_str(
                &format!(
                    "Source: {} (chunk {}, score: {:.4})\n",
                    hit.chunk.file_name,
                    hit.chunk.chunk_index,
                    hit.score
                )
            );
            docs_text.push_str(hit.chunk.text.trim());
            docs_text.push_str("\n\n");
        }
        docs_text.trim_end().to_string()
    }

    pub async fn retrieve(
        &self,
        query: &str,
        limit: Option<usize>
    ) -> Result<Vec<ScoredChunk>, Box<dyn StdError + Send + Sync>> {
        let limit = limit.unwrap_or(self.default_limit);
        let embed_resp = self.embedding_client
            .embed(query).await
            .map_err(|e| Box::new(RagEngineError(format!("Embedding failed: {}", e))))?;

        let hits = self.vector_store
            .search(embed_resp.embedding, limit).await
            .map_err(|e| Box::new(RagEngineError(format!("Vector search failed: {}", e))))?;
        info!("→ Retrieved {} chunks (limit {})", hits.len(), limit);
        Ok(hits)
    }

    /// Single-turn answer grounded on the retrieved chunks.
    pub async fn query_and_answer(
        &self,
        question: &str,
        limit: Option<usize>
    ) -> Result<String, Box<dyn StdError + Send + Sync>> {
        let hits = self.retrieve(question, limit).await?;
        let context = Self::format_context(&hits);
        let final_prompt = prompt::get_rag_answer_prompt(&self.prompt_config, &context, question)?;

        debug!("--- Final Answer Prompt ---\n{}\n--------------------------", final_prompt);

        let answer = self.chat_client
            .complete(&final_prompt).await
            .map_err(|e| Box::new(RagEngineError(format!("Final completion failed: {}", e))))?;
        Ok(answer)
    }
}
