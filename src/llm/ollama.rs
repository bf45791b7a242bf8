use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::core::errors::ApiError;

use super::provider::LlmProvider;
use super::types::GenerationRequest;

const NAME: &str = "ollama";

/// Self-hosted generation over Ollama's HTTP API, which mirrors the
/// OpenAI message shape but streams newline-delimited JSON.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaProvider {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: super::http_client(),
        }
    }

    fn request_body(&self, request: &GenerationRequest, stream: bool) -> Value {
        let mut messages = vec![json!({"role": "system", "content": request.system_prompt})];
        for msg in &request.history {
            messages.push(json!({"role": msg.role, "content": msg.content}));
        }
        messages.push(json!({"role": "user", "content": request.query}));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
        });
        if let Some(obj) = body.as_object_mut() {
            if let Some(max) = request.max_tokens {
                obj.insert("options".to_string(), json!({"num_predict": max}));
            }
        }
        body
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, ApiError> {
        let url = format!("{}/api/chat", self.base_url);
        let res = self
            .client
            .post(&url)
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

        Ok(payload["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn stream_generate(
        &self,
        request: GenerationRequest,
    ) -> Result<mpsc::Receiver<Result<String, ApiError>>, ApiError> {
        let url = format!("{}/api/chat", self.base_url);
        let res = self
            .client
            .post(&url)
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
                            let parsed = parse_chat_line(&line);
                            if let Some(token) = parsed.token {
                                if tx.send(Ok(token)).await.is_err() {
                                    return;
                                }
                            }
                            if parsed.done {
                                return;
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
                if let Some(token) = parse_chat_line(&line).token {
                    let _ = tx.send(Ok(token)).await;
                }
            }
        });

        Ok(rx)
    }
}

struct ChatLine {
    token: Option<String>,
    done: bool,
}

/// One line of Ollama's newline-delimited JSON stream. The final event may
/// carry both content and the done marker.
fn parse_chat_line(line: &str) -> ChatLine {
    let line = line.trim();
    let event = serde_json::from_str::<Value>(line).unwrap_or(Value::Null);
    let token = event["message"]["content"]
        .as_str()
        .filter(|content| !content.is_empty())
        .map(str::to_string);
    ChatLine {
        token,
        done: event["done"].as_bool() == Some(true),
    }
}
