//! In-process stand-ins for the LLM, embedding and vector store backends.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::error::Error as StdError;
use std::sync::atomic::{ AtomicUsize, Ordering };
use tokio::sync::Mutex;

use crate::agent::ChatEngine;
use crate::llm::chat::ChatClient;
use crate::llm::embedding::{ EmbeddingClient, EmbeddingResponse };
use crate::models::api::ChatOptions;
use crate::models::chat::ChatMessage;
use crate::rag::index::{ ChunkPayload, ChunkRecord, ScoredChunk, VectorStore };

const DIMENSION: usize = 256;

pub fn chunk(file: &str, index: usize, text: &str) -> ChunkPayload {
    ChunkPayload {
        doc_id: file.to_string(),
        chunk_index: index,
        text: text.to_string(),
        file_name: file.rsplit('/').next().unwrap_or(file).to_string(),
        private: "false".to_string(),
    }
}

/// Hashed bag-of-words vector, enough for similarity to track word overlap.
pub fn word_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIMENSION];
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in word.to_lowercase().bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        vector[(hash % DIMENSION as u64) as usize] += 1.0;
    }
    vector
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[derive(Default)]
pub struct WordEmbeddingClient {
    calls: AtomicUsize,
}

impl WordEmbeddingClient {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingClient for WordEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<EmbeddingResponse, Box<dyn StdError + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EmbeddingResponse { embedding: word_vector(text) })
    }
}

#[derive(Default)]
pub struct MemoryVectorStore {
    points: Mutex<Vec<(Vec<f32>, ChunkPayload)>>,
}

impl MemoryVectorStore {
    pub async fn insert(&self, payload: ChunkPayload) {
        let vector = word_vector(&payload.text);
        self.points.lock().await.push((vector, payload));
    }

    pub async fn doc_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.points
            .lock().await
            .iter()
            .map(|(_, p)| p.doc_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub async fn len(&self) -> usize {
        self.points.lock().await.len()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn ensure_collection(&self) -> Result<(), Box<dyn StdError + Send + Sync>> {
        Ok(())
    }

    async fn upsert_chunks(
        &self,
        chunks: Vec<ChunkRecord>
    ) -> Result<(), Box<dyn StdError + Send + Sync>> {
        let mut points = self.points.lock().await;
        points.extend(chunks.into_iter().map(|c| (c.vector, c.payload)));
        Ok(())
    }

    async fn delete_document(&self, doc_id: &str) -> Result<(), Box<dyn StdError + Send + Sync>> {
        self.points.lock().await.retain(|(_, p)| p.doc_id != doc_id);
        Ok(())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize
    ) -> Result<Vec<ScoredChunk>, Box<dyn StdError + Send + Sync>> {
        let points = self.points.lock().await;
        let mut hits: Vec<ScoredChunk> = points
            .iter()
            .map(|(v, p)| ScoredChunk { score: cosine(&vector, v), chunk: p.clone() })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[derive(Debug, Clone)]
pub struct RecordedChat {
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
}

/// Replies with canned answers in order, then with "stub answer".
pub struct ScriptedChatClient {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<RecordedChat>>,
    fail: bool,
}

impl ScriptedChatClient {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            calls: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new(vec![]) }
    }

    pub async fn calls(&self) -> Vec<RecordedChat> {
        self.calls.lock().await.clone()
    }

    /// Content of the last message of every call.
    pub async fn prompts(&self) -> Vec<String> {
        self.calls
            .lock().await
            .iter()
            .filter_map(|c| c.messages.last().map(|m| m.content.clone()))
            .collect()
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn chat(
        &self,
        system: Option<&str>,
        messages: &[ChatMessage]
    ) -> Result<String, Box<dyn StdError + Send + Sync>> {
        self.calls.lock().await.push(RecordedChat {
            system: system.map(str::to_string),
            messages: messages.to_vec(),
        });
        if self.fail {
            return Err("model unavailable".into());
        }
        Ok(
            self.replies
                .lock().await
                .pop_front()
                .unwrap_or_else(|| "stub answer".to_string())
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Query(String),
    Chat {
        history: Vec<ChatMessage>,
        latest: String,
        options: ChatOptions,
    },
}

/// `ChatEngine` that echoes a fixed raw reply and records what it was asked.
pub struct StubEngine {
    reply: String,
    fail: bool,
    calls: Mutex<Vec<EngineCall>>,
}

impl StubEngine {
    pub fn replying(reply: &str) -> Self {
        Self { reply: reply.to_string(), fail: false, calls: Mutex::new(Vec::new()) }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::replying("") }
    }

    pub async fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ChatEngine for StubEngine {
    async fn query(&self, text: &str) -> Result<String, Box<dyn StdError + Send + Sync>> {
        self.calls.lock().await.push(EngineCall::Query(text.to_string()));
        if self.fail {
            return Err("engine down".into());
        }
        Ok(self.reply.clone())
    }

    async fn chat(
        &self,
        history: &[ChatMessage],
        latest: &str,
        options: &ChatOptions
    ) -> Result<String, Box<dyn StdError + Send + Sync>> {
        self.calls.lock().await.push(EngineCall::Chat {
            history: history.to_vec(),
            latest: latest.to_string(),
            options: options.clone(),
        });
        if self.fail {
            return Err("engine down".into());
        }
        Ok(self.reply.clone())
    }
}
