use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::errors::ApiError;

use super::EmbeddingProvider;

const NAME: &str = "openai";

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    api_key: String,
    model: String,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: super::http_client(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn name(&self) -> &str {
        NAME
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let res = self
            .client
            .post("https://api.openai.com/v1/embeddings")
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

/// OpenAI-compatible `{"data": [{"embedding": [...]}, ...]}` payloads.
pub(super) fn parse_embedding_data(payload: &Value) -> Vec<Vec<f32>> {
    let mut vectors = Vec::new();
    if let Some(data) = payload["data"].as_array() {
        for item in data {
            if let Some(values) = item["embedding"].as_array() {
                let vector: Vec<f32> = values
                    .iter()
                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                    .collect();
                vectors.push(vector);
            }
        }
    }
    vectors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_openai_embedding_payload() {
        let payload = json!({
            "data": [
                {"embedding": [0.1, 0.2, 0.3]},
                {"embedding": [0.4, 0.5, 0.6]},
            ]
        });
        let vectors = parse_embedding_data(&payload);
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn missing_data_yields_no_vectors() {
        assert!(parse_embedding_data(&json!({"error": "nope"})).is_empty());
    }
}
