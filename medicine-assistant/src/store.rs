//! Vector store for guideline passages.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use qdrant_client::{Payload, Qdrant};
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, DeleteCollectionBuilder, Distance,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embeddings::Embedder;
use crate::error::{AssistantError, Result};

/// A loaded document (or one PDF page) before chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub content: String,
    pub source: String,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub chunk_index: usize,
}

/// A bounded text segment ready to be embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// One search hit. `rank` starts at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub source: String,
    pub page: Option<u32>,
    pub rank: usize,
    pub score: Option<f32>,
}

/// Nearest-neighbour text search over ingested chunks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Embed and store chunks, returning how many were added.
    async fn add(&self, chunks: Vec<DocumentChunk>) -> Result<usize>;

    /// Best `k` matches for `query`, most similar first. Fails with
    /// [`AssistantError::NotFound`] when nothing has been ingested.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn clear(&self) -> Result<()>;
}

/// Guideline chunks kept in a Qdrant collection, compared by cosine distance.
///
/// The collection is created on the first `add`, sized to the embedder's
/// output dimension.
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    embedder: Arc<dyn Embedder>,
    /// Set once the collection is known to exist.
    ready: Mutex<bool>,
}

impl QdrantStore {
    pub async fn connect(
        url: &str,
        api_key: Option<String>,
        collection: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .build()
            .map_err(|e| AssistantError::service("failed to create Qdrant client", e))?;

        let store = Self {
            client,
            collection: collection.to_string(),
            embedder,
            ready: Mutex::new(false),
        };
        *store.ready.lock().await = store.exists().await?;

        info!(url, collection, "Connected to vector store");
        Ok(store)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    async fn exists(&self) -> Result<bool> {
        self.client
            .collection_exists(self.collection.as_str())
            .await
            .map_err(|e| AssistantError::service("failed to look up collection", e))
    }

    async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        let mut ready = self.ready.lock().await;
        if *ready {
            return Ok(());
        }

        if !self.exists().await? {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection)
                        .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
                )
                .await
                .map_err(|e| {
                    AssistantError::service(
                        &format!("failed to create collection '{}'", self.collection),
                        e,
                    )
                })?;
            info!(collection = %self.collection, dimension, "Created collection");
        }
        *ready = true;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        if !self.exists().await? {
            return Ok(0);
        }
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| AssistantError::service("failed to count points", e))?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }
}

#[async_trait]
impl DocumentStore for QdrantStore {
    async fn add(&self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(AssistantError::TransientService(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let dimension = embeddings.first().map(Vec::len).unwrap_or_default();
        self.ensure_collection(dimension).await?;

        let points = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let payload = Payload::try_from(chunk_payload(chunk))
                    .map_err(|e| AssistantError::service("invalid chunk payload", e))?;
                Ok(PointStruct::new(Uuid::new_v4().to_string(), embedding, payload))
            })
            .collect::<Result<Vec<_>>>()?;

        let added = points.len();
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| AssistantError::service("failed to upsert chunks", e))?;

        debug!(collection = %self.collection, added, "Stored chunks");
        Ok(added)
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if self.count().await? == 0 {
            return Err(AssistantError::NotFound(format!(
                "collection '{}' is empty; ingest documents first",
                self.collection
            )));
        }

        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AssistantError::TransientService("no embedding returned for query".to_string())
            })?;

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query_embedding, k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| AssistantError::service("similarity search failed", e))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| chunk_from_payload(&point.payload, point.score))
            .enumerate()
            .map(|(i, chunk)| RetrievedChunk { rank: i + 1, ..chunk })
            .collect())
    }

    async fn len(&self) -> usize {
        match self.count().await {
            Ok(count) => count as usize,
            Err(e) => {
                warn!(collection = %self.collection, "Could not count chunks: {}", e);
                0
            }
        }
    }

    async fn clear(&self) -> Result<()> {
        let mut ready = self.ready.lock().await;
        if self.exists().await? {
            self.client
                .delete_collection(DeleteCollectionBuilder::new(&self.collection))
                .await
                .map_err(|e| AssistantError::service("failed to drop collection", e))?;
        }
        *ready = false;
        info!(collection = %self.collection, "Cleared vector store");
        Ok(())
    }
}

fn chunk_payload(chunk: &DocumentChunk) -> Value {
    json!({
        "content": chunk.content,
        "source": chunk.metadata.source,
        "page": chunk.metadata.page,
        "chunk_index": chunk.metadata.chunk_index,
    })
}

/// Rebuild a hit from its stored payload. Rank is assigned by the caller.
fn chunk_from_payload(payload: &HashMap<String, QdrantValue>, score: f32) -> Option<RetrievedChunk> {
    let content = payload.get("content").and_then(payload_text)?;
    let source = payload
        .get("source")
        .and_then(payload_text)
        .unwrap_or_else(|| "unknown".to_string());
    let page = payload
        .get("page")
        .and_then(payload_integer)
        .and_then(|p| u32::try_from(p).ok());

    Some(RetrievedChunk {
        content,
        source,
        page,
        rank: 0,
        score: Some(score),
    })
}

fn payload_text(value: &QdrantValue) -> Option<String> {
    match value.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

fn payload_integer(value: &QdrantValue) -> Option<i64> {
    match value.kind.as_ref()? {
        Kind::IntegerValue(i) => Some(*i),
        Kind::DoubleValue(f) if f.fract() == 0.0 => Some(*f as i64),
        _ => None,
    }
}
