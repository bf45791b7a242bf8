//! Vector store abstraction over the textbook chunk collection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::ApiError;

mod qdrant;

pub use qdrant::QdrantStore;

/// A bounded unit of textbook text with citation metadata.
///
/// Created during ingestion and immutable afterwards; `score` is populated
/// only on retrieval (cosine similarity, higher is better).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextbookChunk {
    pub id: String,
    pub content: String,
    pub title: String,
    pub chapter: String,
    pub section: String,
    pub url: String,
    pub source_file: String,
    pub position: usize,
    #[serde(default)]
    pub metadata: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl TextbookChunk {
    /// Point payload as stored in the collection (everything but the score).
    pub fn payload(&self) -> Value {
        serde_json::json!({
            "content": self.content,
            "title": self.title,
            "chapter": self.chapter,
            "section": self.section,
            "url": self.url,
            "source_file": self.source_file,
            "position": self.position,
            "metadata": self.metadata,
        })
    }

    /// Rebuild a chunk from a search hit's id, payload and score.
    pub fn from_payload(id: String, payload: &Value, score: Option<f32>) -> Self {
        let text = |key: &str| {
            payload
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        TextbookChunk {
            id,
            content: text("content"),
            title: text("title"),
            chapter: text("chapter"),
            section: text("section"),
            url: text("url"),
            source_file: text("source_file"),
            position: payload
                .get("position")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize,
            metadata: payload.get("metadata").cloned().unwrap_or(Value::Null),
            score,
        }
    }
}

/// Display-oriented projection of a chunk used to attribute answers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub title: String,
    pub url: String,
    pub chapter: String,
    pub section: String,
}

impl From<&TextbookChunk> for Citation {
    fn from(chunk: &TextbookChunk) -> Self {
        Citation {
            title: chunk.title.clone(),
            url: chunk.url.clone(),
            chapter: chunk.chapter.clone(),
            section: chunk.section.clone(),
        }
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if it does not exist yet (cosine distance,
    /// fixed dimensionality).
    async fn ensure_collection(&self, dimension: usize) -> Result<(), ApiError>;

    /// Drop and re-create the collection, destroying all points. Bulk
    /// re-ingestion only.
    async fn recreate_collection(&self, dimension: usize) -> Result<(), ApiError>;

    /// Upsert chunks with their vectors; idempotent by chunk id.
    async fn upsert(&self, points: Vec<(TextbookChunk, Vec<f32>)>) -> Result<(), ApiError>;

    /// Nearest chunks to the query vector, descending score order, at most
    /// `top_k` results.
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<TextbookChunk>, ApiError>;

    /// Reachability probe for the health endpoint.
    async fn health(&self) -> bool;
}
