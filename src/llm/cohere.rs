use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::core::errors::ApiError;

use super::provider::LlmProvider;
use super::types::{ChatMessage, GenerationRequest};

const NAME: &str = "cohere";

#[derive(Debug, Clone)]
pub struct CohereProvider {
    api_key: String,
    model: String,
    client: Client,
}

impl CohereProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: super::http_client(),
        }
    }

    fn request_body(&self, request: &GenerationRequest, stream: bool) -> Value {
        // Cohere has no separate system slot; the prompt rides in front of
        // the user message.
        let mut body = json!({
            "model": self.model,
            "message": format!("{}\n\n{}", request.system_prompt, request.query),
            "stream": stream,
        });
        if let Some(obj) = body.as_object_mut() {
            let history = map_history(&request.history);
            if !history.is_empty() {
                obj.insert("chat_history".to_string(), json!(history));
            }
            if let Some(max) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(max));
            }
        }
        body
    }
}

/// Cohere's chat history uses the USER/CHATBOT role vocabulary.
fn map_history(history: &[ChatMessage]) -> Vec<Value> {
    history
        .iter()
        .map(|msg| {
            let role = if msg.role == "assistant" {
                "CHATBOT"
            } else {
                "USER"
            };
            json!({"role": role, "message": msg.content})
        })
        .collect()
}

#[async_trait]
impl LlmProvider for CohereProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, ApiError> {
        let res = self
            .client
            .post("https://api.cohere.com/v1/chat")
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

        Ok(payload["text"].as_str().unwrap_or_default().to_string())
    }

    async fn stream_generate(
        &self,
        request: GenerationRequest,
    ) -> Result<mpsc::Receiver<Result<String, ApiError>>, ApiError> {
        let res = self
            .client
            .post("https://api.cohere.com/v1/chat")
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
                            match parse_stream_event(&line) {
                                StreamEvent::Token(token) => {
                                    if tx.send(Ok(token)).await.is_err() {
                                        return;
                                    }
                                }
                                StreamEvent::End => return,
                                StreamEvent::Skip => {}
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
                if let StreamEvent::Token(token) = parse_stream_event(&line) {
                    let _ = tx.send(Ok(token)).await;
                }
            }
        });

        Ok(rx)
    }
}

enum StreamEvent {
    Token(String),
    End,
    Skip,
}

/// Cohere streams newline-delimited JSON events tagged with `event_type`.
fn parse_stream_event(line: &str) -> StreamEvent {
    let line = line.trim();
    if line.is_empty() {
        return StreamEvent::Skip;
    }
    let Ok(event) = serde_json::from_str::<Value>(line) else {
        return StreamEvent::Skip;
    };
    match event["event_type"].as_str() {
        Some("text-generation") => match event["text"].as_str() {
            Some(text) if !text.is_empty() => StreamEvent::Token(text.to_string()),
            _ => StreamEvent::Skip,
        },
        Some("stream-end") => StreamEvent::End,
        _ => StreamEvent::Skip,
    }
}
