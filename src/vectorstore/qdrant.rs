//! Qdrant adapter over its REST API.
//!
//! One shared client, one named collection, cosine distance. The optional
//! `api-key` header is attached to every request when configured.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

use crate::core::errors::ApiError;

use super::{TextbookChunk, VectorStore};

#[derive(Clone)]
pub struct QdrantStore {
    base_url: String,
    api_key: Option<String>,
    collection: String,
    client: Client,
}

impl QdrantStore {
    pub fn new(base_url: String, api_key: Option<String>, collection: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            collection,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    async fn create_collection(&self, dimension: usize) -> Result<(), ApiError> {
        let body = json!({
            "vectors": {
                "size": dimension,
                "distance": "Cosine",
            }
        });

        let res = self
            .authed(self.client.put(self.collection_url()).json(&body))
            .send()
            .await
            .map_err(|e| ApiError::Retrieval(format!("qdrant create collection: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Retrieval(format!(
                "qdrant create collection: {}: {}",
                status, text
            )));
        }

        tracing::info!(
            collection = %self.collection,
            dimension,
            "created qdrant collection"
        );
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, dimension: usize) -> Result<(), ApiError> {
        let res = self
            .authed(self.client.get(self.collection_url()))
            .send()
            .await
            .map_err(|e| ApiError::Retrieval(format!("qdrant get collection: {}", e)))?;

        if res.status().is_success() {
            return Ok(());
        }
        self.create_collection(dimension).await
    }

    async fn recreate_collection(&self, dimension: usize) -> Result<(), ApiError> {
        // Drop errors from the delete; the collection may not exist yet.
        let _ = self
            .authed(self.client.delete(self.collection_url()))
            .send()
            .await;
        self.create_collection(dimension).await
    }

    async fn upsert(&self, points: Vec<(TextbookChunk, Vec<f32>)>) -> Result<(), ApiError> {
        if points.is_empty() {
            return Ok(());
        }

        let payload_points: Vec<Value> = points
            .iter()
            .map(|(chunk, vector)| {
                json!({
                    "id": chunk.id,
                    "vector": vector,
                    "payload": chunk.payload(),
                })
            })
            .collect();

        let url = format!("{}/points?wait=true", self.collection_url());
        let res = self
            .authed(
                self.client
                    .put(&url)
                    .json(&json!({ "points": payload_points })),
            )
            .send()
            .await
            .map_err(|e| ApiError::Retrieval(format!("qdrant upsert: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Retrieval(format!(
                "qdrant upsert: {}: {}",
                status, text
            )));
        }

        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<TextbookChunk>, ApiError> {
        let url = format!("{}/points/search", self.collection_url());
        let body = json!({
            "vector": query_vector,
            "limit": top_k,
            "with_payload": true,
        });

        let res = self
            .authed(self.client.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| ApiError::Retrieval(format!("qdrant search: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Retrieval(format!(
                "qdrant search: {}: {}",
                status, text
            )));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ApiError::Retrieval(format!("qdrant search: {}", e)))?;

        Ok(parse_search_hits(&payload))
    }

    async fn health(&self) -> bool {
        let url = format!("{}/collections", self.base_url);
        match self.authed(self.client.get(&url)).send().await {
            Ok(res) => res.status().is_success(),
            Err(_) => false,
        }
    }
}

fn parse_search_hits(payload: &Value) -> Vec<TextbookChunk> {
    let empty = Value::Null;
    payload["result"]
        .as_array()
        .map(|hits| {
            hits.iter()
                .map(|hit| {
                    let id = match &hit["id"] {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    let score = hit["score"].as_f64().map(|s| s as f32);
                    let point_payload = hit.get("payload").unwrap_or(&empty);
                    TextbookChunk::from_payload(id, point_payload, score)
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_response() {
        let payload = json!({
            "result": [
                {
                    "id": "a1",
                    "score": 0.91,
                    "payload": {
                        "content": "Kinematics describes motion...",
                        "title": "Kinematics",
                        "chapter": "Chapter 3",
                        "section": "Motion",
                        "url": "/docs/kinematics",
                        "source_file": "kinematics.md",
                        "position": 0,
                        "metadata": {}
                    }
                },
                {"id": 7, "score": 0.42, "payload": {"content": "Dynamics", "title": "Dynamics"}}
            ]
        });

        let chunks = parse_search_hits(&payload);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].title, "Kinematics");
        assert_eq!(chunks[0].score, Some(0.91));
        assert_eq!(chunks[1].id, "7");
        assert!(chunks[0].score > chunks[1].score);
    }

    #[test]
    fn hit_without_score_yields_none() {
        let payload = json!({"result": [{"id": "x", "payload": {"content": "c"}}]});
        let chunks = parse_search_hits(&payload);
        assert_eq!(chunks[0].score, None);
    }
}
