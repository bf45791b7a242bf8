use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::core::errors::ApiError;

use super::provider::LlmProvider;
use super::types::GenerationRequest;

const NAME: &str = "openai";

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: super::http_client(),
        }
    }

    fn request_body(&self, request: &GenerationRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": build_messages(request),
            "stream": stream,
        });
        if let Some(obj) = body.as_object_mut() {
            if let Some(max) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(max));
            }
        }
        body
    }
}

/// System prompt first, then history in native roles, then the user query.
fn build_messages(request: &GenerationRequest) -> Vec<Value> {
    let mut messages = vec![json!({"role": "system", "content": request.system_prompt})];
    for msg in &request.history {
        messages.push(json!({"role": msg.role, "content": msg.content}));
    }
    messages.push(json!({"role": "user", "content": request.query}));
    messages
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, ApiError> {
        let res = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&self.request_body(&request, false))
            .send()
            .await
            .map_err(|e| ApiError::Generation(format!("{}: {}", NAME, e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Generation(format!(
                "{}: {}: {}",
                NAME, status, text
            )));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ApiError::Generation(format!("{}: {}", NAME, e)))?;

        Ok(payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn stream_generate(
        &self,
        request: GenerationRequest,
    ) -> Result<mpsc::Receiver<Result<String, ApiError>>, ApiError> {
        let res = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&self.request_body(&request, true))
            .send()
            .await
            .map_err(|e| ApiError::Generation(format!("{}: {}", NAME, e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Generation(format!(
                "{}: {}: {}",
                NAME, status, text
            )));
        }

        let (tx, rx) = mpsc::channel(32);
        let mut stream = res.bytes_stream();

        tokio::spawn(async move {
            let mut lines = super::LineBuffer::new();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        for line in lines.push(&bytes) {
                            match parse_sse_line(&line) {
                                SseLine::Done => return,
                                SseLine::Token(token) => {
                                    if tx.send(Ok(token)).await.is_err() {
                                        return;
                                    }
                                }
                                SseLine::Skip => {}
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(Err(ApiError::Generation(format!("{}: {}", NAME, e))))
                            .await;
                        return;
                    }
                }
            }
            if let Some(line) = lines.finish() {
                if let SseLine::Token(token) = parse_sse_line(&line) {
                    let _ = tx.send(Ok(token)).await;
                }
            }
        });

        Ok(rx)
    }
}

pub(super) enum SseLine {
    Token(String),
    Done,
    Skip,
}

/// One line of an OpenAI-style SSE stream.
pub(super) fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    if line.is_empty() {
        return SseLine::Skip;
    }
    if line == "data: [DONE]" {
        return SseLine::Done;
    }
    let Some(data) = line.strip_prefix("data: ") else {
        return SseLine::Skip;
    };
    let Ok(json) = serde_json::from_str::<Value>(data) else {
        return SseLine::Skip;
    };
    match json["choices"][0]["delta"]["content"].as_str() {
        Some(content) if !content.is_empty() => SseLine::Token(content.to_string()),
        _ => SseLine::Skip,
    }
}
