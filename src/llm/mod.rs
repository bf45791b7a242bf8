//! LLM provider abstraction: one variant selected at startup, uniform
//! blocking and streaming generation across all of them.

use std::sync::Arc;

use crate::core::config::Settings;
use crate::core::errors::ApiError;

mod cohere;
mod ollama;
mod openai;
pub mod provider;
pub mod types;

pub use cohere::CohereProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use provider::LlmProvider;
pub use types::{ChatMessage, GenerationRequest};

/// Construct the configured LLM provider, failing fast on an unknown
/// selector or missing credentials. No network call is made here.
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn LlmProvider>, ApiError> {
    match settings.llm_provider.as_str() {
        "openai" => {
            if settings.openai_api_key.is_empty() {
                return Err(ApiError::Config("OPENAI_API_KEY is not set".into()));
            }
            Ok(Arc::new(OpenAiProvider::new(
                settings.openai_api_key.clone(),
                settings.openai_model.clone(),
            )))
        }
        "cohere" => {
            if settings.cohere_api_key.is_empty() {
                return Err(ApiError::Config("COHERE_API_KEY is not set".into()));
            }
            Ok(Arc::new(CohereProvider::new(
                settings.cohere_api_key.clone(),
                settings.cohere_model.clone(),
            )))
        }
        "ollama" => Ok(Arc::new(OllamaProvider::new(
            settings.ollama_url.clone(),
            settings.ollama_model.clone(),
        ))),
        other => Err(ApiError::Config(format!(
            "Unsupported LLM provider: {}",
            other
        ))),
    }
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Reassembles newline-delimited protocol lines from network chunks.
///
/// `bytes_stream()` splits on transport boundaries, not event boundaries,
/// so an SSE or NDJSON event can arrive in two halves. Bytes are buffered
/// until their terminating newline arrives; only then is the line decoded
/// and handed back.
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append a chunk and drain every line it completed. The trailing
    /// partial line stays buffered for the next chunk.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(
                String::from_utf8_lossy(&line)
                    .trim_end_matches(['\r', '\n'])
                    .to_string(),
            );
        }
        lines
    }

    /// The final unterminated line once the stream is exhausted, if any.
    pub(crate) fn finish(self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.buf).trim().to_string();
        (!rest.is_empty()).then_some(rest)
    }
}
