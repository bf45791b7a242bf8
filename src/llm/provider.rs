use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::errors::ApiError;

use super::types::GenerationRequest;

#[async_trait]
pub trait LlmProvider: Send + Sync + std::fmt::Debug {
    /// return the provider name (e.g. "openai", "cohere", "ollama")
    fn name(&self) -> &str;

    /// chat completion (non-streaming)
    async fn generate(&self, request: GenerationRequest) -> Result<String, ApiError>;

    /// chat completion (streaming); fragments arrive in provider-emission
    /// order, and the receiver closing early cancels the producer
    async fn stream_generate(
        &self,
        request: GenerationRequest,
    ) -> Result<mpsc::Receiver<Result<String, ApiError>>, ApiError>;
}
