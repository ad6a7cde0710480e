pub mod agent;
pub mod cli;
pub mod config;
pub mod history;
pub mod llm;
pub mod models;
pub mod rag;
pub mod response;
pub mod server;
pub mod tools;

#[cfg(test)]
mod testing;

use agent::RagAgent;
use cli::Args;
use history::ConversationStore;
use log::info;
use rag::generate::generate_datasource;
use rag::index::{ QdrantVectorStore, VectorStore };
use rag::rag::RagEngine;
use server::Server;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr());
    info!("TLS Enabled: {}", args.enable_tls);
    info!("LLM Provider: {}", args.llm_provider);
    info!("LLM Model: {}", args.llm_model.as_deref().unwrap_or("provider default"));
    info!(
        "Embedding Provider: {}",
        args.embedding_provider.as_deref().unwrap_or(&args.llm_provider)
    );
    info!("Vector Store Host: {}", args.vector_host);
    info!("Vector Collection: {} (dim {}, {})", args.vector_collection, args.vector_dimension, args.vector_metric);
    info!("Data Dir: {}", args.data_dir);
    info!("Storage Dir: {}", args.storage_dir);
    info!("Chunking: {} words, {} overlap", args.chunk_size, args.chunk_overlap);
    info!("Prompts Path: {}", args.prompts_path);
    info!("Tools Config: {}", args.tools_config);
    info!("-------------------------");
    args.validate()?;

    let chat_client = llm::chat::new_client(&args.chat_llm_config()?)?;
    let embedding_client = llm::embedding::new_client(&args.embedding_llm_config()?)?;
    let vector_store: Arc<dyn VectorStore> = Arc::new(
        QdrantVectorStore::new(
            &args.vector_host,
            args.vector_secret.clone(),
            &args.vector_collection,
            args.vector_dimension,
            &args.vector_metric
        )?
    );

    if args.generate_only || !Path::new(&args.storage_dir).exists() {
        generate_datasource(&args, Arc::clone(&embedding_client), Arc::clone(&vector_store)).await?;
        if args.generate_only {
            return Ok(());
        }
    }

    let prompt_config = config::prompt::load_prompts(&args.prompts_path)?;
    let tools_config = config::tools::load_tools_config(&args.tools_config)?;
    let tools = tools::load_tools(&tools_config);

    let rag = Arc::new(
        RagEngine::new(
            vector_store,
            Arc::clone(&chat_client),
            embedding_client,
            Arc::clone(&prompt_config),
            args.rag_default_limit
        )
    );
    let agent = Arc::new(
        RagAgent::new(
            rag,
            chat_client,
            prompt_config,
            tools,
            args.system_prompt.clone(),
            args.agent_max_steps
        )
    );

    let store = Arc::new(ConversationStore::new());
    let server = Server::new(args, agent, store);
    server.run().await?;

    Ok(())
}
