use clap::Parser;
use std::error::Error;

use crate::llm::{ LlmConfig, LlmType };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address for the HTTP server to listen on.
    #[arg(long, env = "APP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port for the HTTP server.
    #[arg(long, env = "APP_PORT", default_value = "8000")]
    pub port: u16,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    /// Directory with generated files served under /api/files/output.
    #[arg(long, env = "OUTPUT_DIR", default_value = "output")]
    pub output_dir: String,

    // --- Chat LLM Provider Args ---
    /// LLM provider (ollama, openai, lm-studio, anthropic, gemini, deepseek, xai, groq)
    #[arg(long, env = "LLM_PROVIDER", default_value = "ollama")]
    pub llm_provider: String,

    /// Model name for chat completion (e.g., qwen3:4b, gpt-4o-mini)
    #[arg(long, env = "LLM_MODEL")] // No default, rely on provider defaults if None
    pub llm_model: Option<String>,

    /// Base URL for the LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "LLM_BASE_URL")]
    pub llm_base_url: Option<String>,

    /// API Key for hosted LLM providers
    #[arg(long, env = "LLM_API_KEY", default_value = "")]
    pub llm_api_key: String,

    /// Upper bound on generated tokens per answer.
    #[arg(long, env = "LLM_MAX_NEW_TOKENS", default_value = "256")]
    pub llm_max_new_tokens: u32,

    #[arg(long, env = "LLM_TEMPERATURE", default_value = "0.7")]
    pub llm_temperature: f32,

    // --- Embedding Provider Args ---
    /// Provider for text embeddings. Defaults to LLM_PROVIDER if not set.
    #[arg(long, env = "EMBEDDING_PROVIDER")]
    pub embedding_provider: Option<String>,

    /// Model name for text embedding (e.g., nomic-embed-text, text-embedding-3-small)
    #[arg(long, env = "EMBEDDING_MODEL")]
    pub embedding_model: Option<String>,

    /// Base URL for the embedding provider. Defaults to LLM_BASE_URL if not set.
    #[arg(long, env = "EMBEDDING_BASE_URL")]
    pub embedding_base_url: Option<String>,

    /// API Key for the embedding provider. Defaults to LLM_API_KEY if not set.
    #[arg(long, env = "EMBEDDING_API_KEY")]
    pub embedding_api_key: Option<String>,

    // --- Vector Store Args ---
    /// Qdrant endpoint (gRPC port)
    #[arg(long, env = "VECTOR_HOST", default_value = "http://localhost:6334")]
    pub vector_host: String,

    /// API key for the vector database
    #[arg(long, env = "VECTOR_SECRET")]
    pub vector_secret: Option<String>,

    /// Collection that holds document chunks
    #[arg(long, env = "VECTOR_COLLECTION", default_value = "default")]
    pub vector_collection: String,

    /// Vector dimension size, must match the embedding model
    #[arg(long, env = "VECTOR_DIMENSION", default_value = "768")]
    pub vector_dimension: u64,

    /// Distance metric for vector similarity (cosine, dot, euclid, manhattan)
    #[arg(long, env = "VECTOR_METRIC", default_value = "cosine")]
    pub vector_metric: String,

    // --- Ingestion Args ---
    /// Directory with source documents to index.
    #[arg(long, env = "DATA_DIR", default_value = ".data")]
    pub data_dir: String,

    /// Directory where the document store is persisted. The index is built
    /// at startup when it does not exist.
    #[arg(long, env = "STORAGE_DIR", default_value = ".storage")]
    pub storage_dir: String,

    /// Chunk size in words.
    #[arg(long, env = "CHUNK_SIZE", default_value = "1024")]
    pub chunk_size: usize,

    /// Words shared between consecutive chunks.
    #[arg(long, env = "CHUNK_OVERLAP", default_value = "20")]
    pub chunk_overlap: usize,

    /// Number of embedding requests in flight while indexing.
    #[arg(long, env = "EMBEDDING_CONCURRENCY", default_value = "4")]
    pub embedding_concurrency: usize,

    /// Build or refresh the index, then exit without serving.
    #[arg(long, default_value = "false")]
    pub generate_only: bool,

    // --- Agent Args ---
    /// System prompt used when a request does not bring its own.
    #[arg(long, env = "SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    /// Default number of chunks retrieved per question.
    #[arg(long, env = "RAG_DEFAULT_LIMIT", default_value = "2")]
    pub rag_default_limit: usize,

    /// Maximum number of tool calls in one chat turn.
    #[arg(long, env = "AGENT_MAX_STEPS", default_value = "3")]
    pub agent_max_steps: usize,

    /// Path to the YAML file listing agent tools.
    #[arg(long, env = "TOOLS_CONFIG", default_value = "config/tools.yaml")]
    pub tools_config: String,

    /// Path to the prompt template file.
    #[arg(long, env = "PROMPTS_PATH", default_value = "json/prompts.json")]
    pub prompts_path: String,
}

impl Args {
    pub fn validate(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if self.chunk_size == 0 {
            return Err("CHUNK_SIZE must be greater than 0".into());
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(
                format!(
                    "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                    self.chunk_overlap,
                    self.chunk_size
                ).into()
            );
        }
        if self.rag_default_limit == 0 {
            return Err("RAG_DEFAULT_LIMIT must be greater than 0".into());
        }
        if self.embedding_concurrency == 0 {
            return Err("EMBEDDING_CONCURRENCY must be greater than 0".into());
        }
        if self.vector_dimension == 0 {
            return Err("VECTOR_DIMENSION must be greater than 0".into());
        }
        if self.enable_tls && (self.tls_cert_path.is_none() || self.tls_key_path.is_none()) {
            return Err("ENABLE_TLS requires both TLS_CERT_PATH and TLS_KEY_PATH".into());
        }
        self.chat_llm_config()?;
        self.embedding_llm_config()?;
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn chat_llm_config(&self) -> Result<LlmConfig, Box<dyn Error + Send + Sync>> {
        let llm_type: LlmType = self.llm_provider
            .parse()
            .map_err(|e| format!("Invalid LLM_PROVIDER: {}", e))?;
        Ok(LlmConfig {
            llm_type,
            api_key: Some(self.llm_api_key.clone()).filter(|k| !k.is_empty()),
            completion_model: self.llm_model.clone(),
            embedding_model: None,
            base_url: self.llm_base_url.clone(),
            max_tokens: Some(self.llm_max_new_tokens),
            temperature: Some(self.llm_temperature),
        })
    }

    pub fn embedding_llm_config(&self) -> Result<LlmConfig, Box<dyn Error + Send + Sync>> {
        let provider_str = match &self.embedding_provider {
            Some(s) if !s.trim().is_empty() => s.as_str(),
            _ => &self.llm_provider,
        };
        let llm_type: LlmType = provider_str
            .parse()
            .map_err(|e| format!("Invalid EMBEDDING_PROVIDER: {}", e))?;
        let api_key = self.embedding_api_key.as_deref().unwrap_or(&self.llm_api_key);
        Ok(LlmConfig {
            llm_type,
            api_key: Some(api_key.to_string()).filter(|k| !k.is_empty()),
            completion_model: None,
            embedding_model: self.embedding_model.clone(),
            base_url: self.embedding_base_url.clone().or_else(|| self.llm_base_url.clone()),
            max_tokens: None,
            temperature: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["rag-chat-server"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let args = parse(&["--chunk-size", "100", "--chunk-overlap", "100"]);
        assert!(args.validate().is_err());
        let args = parse(&["--chunk-size", "100", "--chunk-overlap", "10"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn tls_requires_both_paths() {
        let args = parse(&["--enable-tls", "--tls-cert-path", "cert.pem"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn embedding_config_inherits_chat_settings() {
        let args = parse(&[
            "--llm-provider",
            "openai",
            "--llm-api-key",
            "sk-chat",
            "--llm-base-url",
            "http://proxy/v1/",
        ]);
        let embed = args.embedding_llm_config().unwrap();
        assert_eq!(embed.llm_type, LlmType::OpenAI);
        assert_eq!(embed.api_key.as_deref(), Some("sk-chat"));
        assert_eq!(embed.base_url.as_deref(), Some("http://proxy/v1/"));

        let args = parse(&["--llm-provider", "lm-studio", "--embedding-provider", "ollama"]);
        assert_eq!(args.embedding_llm_config().unwrap().llm_type, LlmType::Ollama);
    }

    #[test]
    fn unknown_provider_fails_validation() {
        let args = parse(&["--llm-provider", "huggingface"]);
        assert!(args.validate().is_err());
    }
}
