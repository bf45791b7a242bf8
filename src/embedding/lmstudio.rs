use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::errors::ApiError;

use super::openai::parse_embedding_data;
use super::EmbeddingProvider;

const NAME: &str = "lmstudio";

/// Local embedding models served through LM Studio's OpenAI-compatible
/// endpoint. No API key required.
#[derive(Debug, Clone)]
pub struct LmStudioEmbedder {
    base_url: String,
    model: String,
    client: Client,
}

impl LmStudioEmbedder {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: super::http_client(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for LmStudioEmbedder {
    fn name(&self) -> &str {
        NAME
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": texts,
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
        let vectors = parse_embedding_data(&payload);

        if vectors.len() != texts.len() {
            return Err(ApiError::embedding(
                NAME,
                format!("expected {} vectors, got {}", texts.len(), vectors.len()),
            ));
        }

        Ok(vectors)
    }
}
