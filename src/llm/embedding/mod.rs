use async_trait::async_trait;
use log::{ info, warn };
use rllm::{ builder::LLMBuilder, LLMProvider };
use std::error::Error as StdError;
use std::sync::Arc;

use super::{ LlmConfig, LlmType };

#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
}

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<EmbeddingResponse, Box<dyn StdError + Send + Sync>>;

    async fn embed_batch(
        &self,
        texts: &[String]
    ) -> Result<Vec<Vec<f32>>, Box<dyn StdError + Send + Sync>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?.embedding);
        }
        Ok(vectors)
    }
}

pub struct RllmEmbeddingClient {
    llm: Box<dyn LLMProvider + Send + Sync>,
    model: String,
}

impl RllmEmbeddingClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        if matches!(config.llm_type, LlmType::Anthropic | LlmType::XAI | LlmType::Groq) {
            warn!(
                "WARNING: Creating {} embedding client. This backend likely does not support embeddings.",
                config.llm_type
            );
        }
        let model = config.embedding_model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| config.llm_type.default_embedding_model().to_string());

        let mut builder = LLMBuilder::new()
            .backend(config.llm_type.backend())
            .api_key(config.resolved_api_key()?)
            .model(&model)
            .stream(false);
        if let Some(url) = config.resolved_base_url() {
            builder = builder.base_url(url);
        }

        let llm_provider = builder.build()?;
        Ok(Self { llm: llm_provider, model })
    }
}

#[async_trait]
impl EmbeddingClient for RllmEmbeddingClient {
    async fn embed(
        &self,
        text: &str
    ) -> Result<EmbeddingResponse, Box<dyn StdError + Send + Sync>> {
        let mut embeddings = self.llm.embed(vec![text.to_string()]).await?;
        let embedding = embeddings
            .pop()
            .ok_or_else(|| format!("Embedding model '{}' returned no results", self.model))?;

        Ok(EmbeddingResponse { embedding })
    }

    async fn embed_batch(
        &self,
        texts: &[String]
    ) -> Result<Vec<Vec<f32>>, Box<dyn StdError + Send + Sync>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.llm.embed(texts.to_vec()).await?;
        if embeddings.len() != texts.len() {
            return Err(
                format!(
                    "Embedding model '{}' returned {} vectors for {} inputs",
                    self.model,
                    embeddings.len(),
                    texts.len()
                ).into()
            );
        }
        Ok(embeddings)
    }
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn EmbeddingClient>, Box<dyn StdError + Send + Sync>> {
    let client = RllmEmbeddingClient::from_config(config)?;
    info!(
        "Embedding client configured: Type={}, Model={}, BaseURL={}",
        config.llm_type,
        client.model,
        config.resolved_base_url().as_deref().unwrap_or("adapter default")
    );
    Ok(Arc::new(client))
}
