//! Embedding provider abstraction.
//!
//! One provider is selected at startup from `EMBEDDING_PROVIDER`; every
//! variant must emit vectors of the deployment's fixed dimensionality so
//! they stay compatible with the vector collection.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::config::Settings;
use crate::core::errors::ApiError;

mod cohere;
mod lmstudio;
mod ollama;
mod openai;

pub use cohere::CohereEmbedder;
pub use lmstudio::LmStudioEmbedder;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Provider name (e.g. "openai", "cohere", "ollama", "lmstudio").
    fn name(&self) -> &str;

    /// Embed a batch of texts, one vector per input, order-preserving.
    ///
    /// Fails as a whole: callers never receive a partially-filled list.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;

    /// Single-text convenience form.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ApiError::embedding(self.name(), "provider returned no vector"))
    }
}

/// Construct the configured embedding provider, failing fast on an unknown
/// selector or missing credentials.
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>, ApiError> {
    match settings.embedding_provider.as_str() {
        "openai" => {
            if settings.openai_api_key.is_empty() {
                return Err(ApiError::Config("OPENAI_API_KEY is not set".into()));
            }
            Ok(Arc::new(OpenAiEmbedder::new(
                settings.openai_api_key.clone(),
                settings.openai_embedding_model.clone(),
            )))
        }
        "cohere" => {
            if settings.cohere_api_key.is_empty() {
                return Err(ApiError::Config("COHERE_API_KEY is not set".into()));
            }
            Ok(Arc::new(CohereEmbedder::new(
                settings.cohere_api_key.clone(),
                settings.cohere_embedding_model.clone(),
            )))
        }
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(
            settings.ollama_url.clone(),
            settings.ollama_embedding_model.clone(),
        ))),
        "local" | "lmstudio" => Ok(Arc::new(LmStudioEmbedder::new(
            settings.lmstudio_url.clone(),
            settings.lmstudio_embedding_model.clone(),
        ))),
        other => Err(ApiError::Config(format!(
            "Unsupported embedding provider: {}",
            other
        ))),
    }
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
