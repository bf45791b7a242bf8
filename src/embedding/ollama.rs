use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::errors::ApiError;

use super::EmbeddingProvider;

const NAME: &str = "ollama";

/// Self-hosted embeddings over Ollama's HTTP API.
///
/// The `/api/embeddings` endpoint takes one prompt per call, so batches are
/// embedded sequentially; a failure anywhere aborts the whole batch.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaEmbedder {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: super::http_client(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn name(&self) -> &str {
        NAME
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let mut vectors = Vec::with_capacity(texts.len());

        for text in texts {
            let body = json!({
                "model": self.model,
                "prompt": text,
            });

            let res = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| ApiError::embedding(NAME, e))?;

            if !res.status().is_success() {
                let status = res.status();
                let text = res.text().await.unwrap_or_default();
                return Err(ApiError::embedding(NAME, format!("{}: {}", status, text)));
            }

            let payload: Value = res.json().await.map_err(|e| ApiError::embedding(NAME, e))?;
            let vector: Vec<f32> = payload["embedding"]
                .as_array()
                .map(|values| {
                    values
                        .iter()
                        .filter_map(|v| v.as_f64().map(|f| f as f32))
                        .collect()
                })
                .unwrap_or_default();

            if vector.is_empty() {
                return Err(ApiError::embedding(NAME, "response contained no embedding"));
            }

            vectors.push(vector);
        }

        Ok(vectors)
    }
}
