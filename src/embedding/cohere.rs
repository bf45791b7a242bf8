use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::errors::ApiError;

use super::EmbeddingProvider;

const NAME: &str = "cohere";

#[derive(Debug, Clone)]
pub struct CohereEmbedder {
    api_key: String,
    model: String,
    client: Client,
}

impl CohereEmbedder {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: super::http_client(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for CohereEmbedder {
    fn name(&self) -> &str {
        NAME
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let body = json!({
            "model": self.model,
            "texts": texts,
            "input_type": "search_document",
        });

        let res = self
            .client
            .post("https://api.cohere.com/v1/embed")
            .bearer_auth(&self.api_key)
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
        let vectors = parse_embeddings(&payload);

        if vectors.len() != texts.len() {
            return Err(ApiError::embedding(
                NAME,
                format!("expected {} vectors, got {}", texts.len(), vectors.len()),
            ));
        }

        Ok(vectors)
    }
}

/// Cohere returns `{"embeddings": [[...], [...]]}`.
fn parse_embeddings(payload: &Value) -> Vec<Vec<f32>> {
    payload["embeddings"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row.as_array())
                .map(|values| {
                    values
                        .iter()
                        .filter_map(|v| v.as_f64().map(|f| f as f32))
                        .collect()
                })
                .collect()
        })
        .unwrap_or_default()
}
