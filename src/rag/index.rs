use async_trait::async_trait;
use log::{ info, warn };
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition,
    CreateCollectionBuilder,
    DeletePointsBuilder,
    Distance,
    Filter,
    PointStruct,
    SearchPointsBuilder,
    UpsertPointsBuilder,
    VectorParams,
};
use qdrant_client::qdrant::vectors_config::Config as VectorsConfig;
use serde::{ Deserialize, Serialize };
use serde_json::Value as JsonValue;
use std::error::Error as StdError;
use uuid::Uuid;

/// A chunk ready to be written to the index.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub doc_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub file_name: String,
    pub private: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub score: f32,
    pub chunk: ChunkPayload,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn ensure_collection(&self) -> Result<(), Box<dyn StdError + Send + Sync>>;

    async fn upsert_chunks(
        &self,
        chunks: Vec<ChunkRecord>
    ) -> Result<(), Box<dyn StdError + Send + Sync>>;

    async fn delete_document(&self, doc_id: &str) -> Result<(), Box<dyn StdError + Send + Sync>>;

    async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize
    ) -> Result<Vec<ScoredChunk>, Box<dyn StdError + Send + Sync>>;
}

pub fn parse_distance(metric: &str) -> Result<Distance, String> {
    match metric.to_lowercase().as_str() {
        "cosine" => Ok(Distance::Cosine),
        "dot" | "dotproduct" | "ip" => Ok(Distance::Dot),
        "euclid" | "euclidean" | "l2" => Ok(Distance::Euclid),
        "manhattan" => Ok(Distance::Manhattan),
        other => Err(format!("Unsupported vector metric: {}", other)),
    }
}

pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    dimension: u64,
    distance: Distance,
}

impl QdrantVectorStore {
    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection: &str,
        dimension: u64,
        metric: &str
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let distance = parse_distance(metric)?;
        let client = Qdrant::from_url(url)
            .api_key(api_key.filter(|k| !k.is_empty()))
            .build()?;
        info!("Vector store client created for {} (collection '{}')", url, collection);
        Ok(Self {
            client,
            collection: collection.to_string(),
            dimension,
            distance,
        })
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_collection(&self) -> Result<(), Box<dyn StdError + Send + Sync>> {
        if self.client.collection_info(&self.collection).await.is_ok() {
            info!("Qdrant collection '{}' already exists.", self.collection);
            return Ok(());
        }

        info!("Qdrant collection '{}' not found. Creating...", self.collection);
        let create_collection = CreateCollectionBuilder::new(self.collection.clone())
            .vectors_config(
                VectorsConfig::Params(VectorParams {
                    size: self.dimension,
                    distance: self.distance.into(),
                    ..Default::default()
                })
            )
            .build();
        self.client.create_collection(create_collection).await?;
        info!(
            "Created Qdrant collection '{}' with dimension {}.",
            self.collection,
            self.dimension
        );
        Ok(())
    }

    async fn upsert_chunks(
        &self,
        chunks: Vec<ChunkRecord>
    ) -> Result<(), Box<dyn StdError + Send + Sync>> {
        if chunks.is_empty() {
            return Ok(());
        }
        let mut points = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.vector.len() as u64 != self.dimension {
                return Err(
                    format!(
                        "Embedding dimension {} does not match VECTOR_DIMENSION {}",
                        chunk.vector.len(),
                        self.dimension
                    ).into()
                );
            }
            match serde_json::to_value(&chunk.payload)? {
                JsonValue::Object(map) => {
                    let point_id = Uuid::new_v4().to_string();
                    points.push(PointStruct::new(point_id, chunk.vector, map));
                }
                _ => {
                    return Err("Chunk payload did not serialize to an object".into());
                }
            }
        }
        let upsert_op = UpsertPointsBuilder::new(&self.collection, points).wait(true).build();
        self.client.upsert_points(upsert_op).await?;
        Ok(())
    }

    async fn delete_document(&self, doc_id: &str) -> Result<(), Box<dyn StdError + Send + Sync>> {
        let delete_op = DeletePointsBuilder::new(&self.collection)
            .points(Filter::must([Condition::matches("doc_id", doc_id.to_string())]))
            .wait(true);
        self.client.delete_points(delete_op).await?;
        Ok(())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize
    ) -> Result<Vec<ScoredChunk>, Box<dyn StdError + Send + Sync>> {
        let search_response = self.client.search_points(
            SearchPointsBuilder::new(&self.collection, vector, limit as u64).with_payload(true)
        ).await?;

        let mut hits = Vec::with_capacity(search_response.result.len());
        for point in search_response.result {
            let mut map = serde_json::Map::new();
            for (k, v) in point.payload {
                match serde_json::to_value(v) {
                    Ok(val) => {
                        map.insert(k, val);
                    }
                    Err(err) => warn!("Skipping field '{}' in chunk payload: {}", k, err),
                }
            }
            match serde_json::from_value::<ChunkPayload>(JsonValue::Object(map)) {
                Ok(chunk) => hits.push(ScoredChunk { score: point.score, chunk }),
                Err(err) => warn!("Malformed chunk payload, skipping hit: {}", err),
            }
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names() {
        assert_eq!(parse_distance("cosine").unwrap(), Distance::Cosine);
        assert_eq!(parse_distance("L2").unwrap(), Distance::Euclid);
        assert_eq!(parse_distance("ip").unwrap(), Distance::Dot);
        assert!(parse_distance("hamming").is_err());
    }
}
