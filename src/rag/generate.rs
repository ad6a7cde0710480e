use futures::{ stream, StreamExt, TryStreamExt };
use log::{ info, warn };
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::Args;
use crate::llm::embedding::EmbeddingClient;
use crate::rag::docstore::{ content_hash, DocStore };
use crate::rag::index::{ ChunkPayload, ChunkRecord, VectorStore };
use crate::rag::loader::{ load_documents, Document, LoaderError };
use crate::rag::splitter::SentenceSplitter;

const EMBED_BATCH_SIZE: usize = 16;

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub data_dir: PathBuf,
    pub storage_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embedding_concurrency: usize,
}

impl From<&Args> for IngestionConfig {
    fn from(args: &Args) -> Self {
        Self {
            data_dir: PathBuf::from(&args.data_dir),
            storage_dir: PathBuf::from(&args.storage_dir),
            chunk_size: args.chunk_size,
            chunk_overlap: args.chunk_overlap,
            embedding_concurrency: args.embedding_concurrency,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    pub indexed: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub chunks: usize,
}

async fn embed_chunks(
    embedding_client: &Arc<dyn EmbeddingClient>,
    pieces: &[String],
    concurrency: usize
) -> Result<Vec<Vec<f32>>, Box<dyn Error + Send + Sync>> {
    let batches: Vec<Vec<String>> = pieces
        .chunks(EMBED_BATCH_SIZE)
        .map(|b| b.to_vec())
        .collect();
    let embedded: Vec<Vec<Vec<f32>>> = stream
        ::iter(batches)
        .map(|batch| {
            let client = Arc::clone(embedding_client);
            async move { client.embed_batch(&batch).await }
        })
        .buffered(concurrency.max(1))
        .try_collect().await?;
    Ok(embedded.into_iter().flatten().collect())
}

async fn index_document(
    doc: &Document,
    splitter: &SentenceSplitter,
    embedding_client: &Arc<dyn EmbeddingClient>,
    vector_store: &Arc<dyn VectorStore>,
    concurrency: usize
) -> Result<usize, Box<dyn Error + Send + Sync>> {
    let pieces = splitter.split(&doc.text);
    let vectors = embed_chunks(embedding_client, &pieces, concurrency).await?;

    let file_name = doc.metadata.get("file_name").cloned().unwrap_or_else(|| doc.id.clone());
    let private = doc.metadata.get("private").cloned().unwrap_or_else(|| "false".to_string());
    let records: Vec<ChunkRecord> = pieces
        .into_iter()
        .zip(vectors)
        .enumerate()
        .map(|(chunk_index, (text, vector))| ChunkRecord {
            vector,
            payload: ChunkPayload {
                doc_id: doc.id.clone(),
                chunk_index,
                text,
                file_name: file_name.clone(),
                private: private.clone(),
            },
        })
        .collect();
    let count = records.len();

    vector_store.delete_document(&doc.id).await?;
    vector_store.upsert_chunks(records).await?;
    Ok(count)
}

/// Brings the vector index in line with the data directory: new and changed
/// documents are (re)embedded, unchanged ones skipped, vanished ones deleted.
pub async fn run_pipeline(
    config: &IngestionConfig,
    embedding_client: Arc<dyn EmbeddingClient>,
    vector_store: Arc<dyn VectorStore>
) -> Result<IngestionReport, Box<dyn Error + Send + Sync>> {
    vector_store.ensure_collection().await?;

    // an existing but empty data directory still prunes the index
    let (mut documents, loaded) = match load_documents(&config.data_dir) {
        Ok(docs) => (docs, true),
        Err(e @ LoaderError::NoDocuments(_)) => {
            warn!("{}. Indexed documents will be removed.", e);
            (Vec::new(), true)
        }
        Err(e) if e.is_recoverable() => {
            warn!("Failed to load file documents, error message: {}. Return as empty document list.", e);
            (Vec::new(), false)
        }
        Err(e) => {
            return Err(Box::new(e));
        }
    };
    for doc in documents.iter_mut() {
        doc.metadata.insert("private".to_string(), "false".to_string());
    }

    let mut docstore = DocStore::load(&config.storage_dir)?;
    let splitter = SentenceSplitter::new(config.chunk_size, config.chunk_overlap);
    let mut report = IngestionReport::default();

    for doc in &documents {
        let hash = content_hash(&doc.text);
        if docstore.is_current(&doc.id, &hash) {
            report.unchanged += 1;
            continue;
        }
        let count = index_document(
            doc,
            &splitter,
            &embedding_client,
            &vector_store,
            config.embedding_concurrency
        ).await?;
        info!("Indexed {} ({} chunks)", doc.id, count);
        docstore.upsert(&doc.id, hash, count);
        report.indexed += 1;
        report.chunks += count;
    }

    if loaded {
        let present: Vec<&str> = documents
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        let stale: Vec<String> = docstore
            .stale_ids(&present)
            .into_iter()
            .map(str::to_string)
            .collect();
        for doc_id in stale {
            vector_store.delete_document(&doc_id).await?;
            docstore.remove(&doc_id);
            info!("Removed {} from the index", doc_id);
            report.deleted += 1;
        }
    } else if !docstore.docs.is_empty() {
        warn!("Keeping {} previously indexed documents since the data directory could not be read", docstore.docs.len());
    }

    docstore.persist(&config.storage_dir)?;
    Ok(report)
}

pub async fn generate_datasource(
    args: &Args,
    embedding_client: Arc<dyn EmbeddingClient>,
    vector_store: Arc<dyn VectorStore>
) -> Result<IngestionReport, Box<dyn Error + Send + Sync>> {
    info!("Generate index for the provided data");
    let config = IngestionConfig::from(args);
    let report = run_pipeline(&config, embedding_client, vector_store).await?;
    info!(
        "Finished generating the index: {} indexed, {} unchanged, {} deleted, {} chunks written",
        report.indexed,
        report.unchanged,
        report.deleted,
        report.chunks
    );
    Ok(report)
}
