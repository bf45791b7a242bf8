//! Generation orchestrator: ties retrieval, history and the LLM provider
//! together into one answer per query.
//!
//! Two short-circuits run before any model call: plain greetings get a
//! canned reply, and queries that retrieve nothing get a fallback that
//! names a few topics the corpus does cover.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::core::errors::ApiError;
use crate::history::{HistoryStore, StoredMessage};
use crate::llm::{ChatMessage, GenerationRequest, LlmProvider};
use crate::retrieval::RetrievalService;
use crate::vectorstore::{Citation, TextbookChunk};

const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "greetings",
    "good morning",
    "good afternoon",
    "good evening",
];

const GREETING_REPLY: &str = "Hello! I'm the assistant for the Physical AI & \
Humanoid Robotics textbook. Ask me anything about the material and I'll \
answer from the text.";

const SYSTEM_PROMPT: &str = "You are an AI assistant for the Physical AI & \
Humanoid Robotics textbook. Answer the question using only the textbook \
context below. If the context does not contain the answer, say that the \
textbook does not cover it. Do not invent material that is not in the \
context.";

/// Probe queries used to harvest sample topics for the no-match fallback.
const PROBE_QUERIES: &[&str] = &["introduction", "robot", "control", "sensors"];

const MAX_SUGGESTED_TOPICS: usize = 5;

/// Prior messages included as conversational history.
const HISTORY_WINDOW: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub response: String,
    pub citations: Vec<Citation>,
    pub sources: Vec<String>,
}

pub struct ChatService {
    retrieval: Arc<RetrievalService>,
    llm: Arc<dyn LlmProvider>,
    history: HistoryStore,
    max_response_length: u32,
}

/// What the orchestrator decided to do for a query, shared by the blocking
/// and streaming paths.
enum Plan {
    /// Reply without calling the model (greeting or no-match fallback).
    Canned(String),
    Generate {
        request: GenerationRequest,
        chunks: Vec<TextbookChunk>,
    },
}

impl ChatService {
    pub fn new(
        retrieval: Arc<RetrievalService>,
        llm: Arc<dyn LlmProvider>,
        history: HistoryStore,
        max_response_length: u32,
    ) -> Self {
        Self {
            retrieval,
            llm,
            history,
            max_response_length,
        }
    }

    pub async fn process_query(
        &self,
        query: &str,
        conversation_id: Option<&str>,
        selected_text: Option<&str>,
    ) -> Result<ChatResponse, ApiError> {
        let (conversation_id, plan) = self.plan(query, conversation_id, selected_text).await?;

        match plan {
            Plan::Canned(response) => {
                self.history
                    .save_message(&conversation_id, "assistant", &response, &[])
                    .await?;
                Ok(ChatResponse {
                    conversation_id,
                    response,
                    citations: vec![],
                    sources: vec![],
                })
            }
            Plan::Generate { request, chunks } => {
                let response = self.llm.generate(request).await?;
                let sources: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
                let citations: Vec<Citation> = chunks.iter().map(Citation::from).collect();
                self.history
                    .save_message(&conversation_id, "assistant", &response, &sources)
                    .await?;
                Ok(ChatResponse {
                    conversation_id,
                    response,
                    citations,
                    sources,
                })
            }
        }
    }

    /// Streaming variant: fragments arrive on the returned channel in
    /// provider-emission order; the concatenation is persisted as the
    /// assistant message when the stream ends. If the receiver is dropped
    /// early, whatever was received so far is persisted as a partial record.
    pub async fn stream_response(
        &self,
        query: &str,
        conversation_id: Option<&str>,
        selected_text: Option<&str>,
    ) -> Result<(String, mpsc::Receiver<Result<String, ApiError>>), ApiError> {
        let (conversation_id, plan) = self.plan(query, conversation_id, selected_text).await?;
        let (tx, rx) = mpsc::channel(32);

        match plan {
            Plan::Canned(response) => {
                self.history
                    .save_message(&conversation_id, "assistant", &response, &[])
                    .await?;
                let _ = tx.send(Ok(response)).await;
            }
            Plan::Generate { request, chunks } => {
                let mut provider_rx = self.llm.stream_generate(request).await?;
                let sources: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
                let history = self.history.clone();
                let conversation = conversation_id.clone();

                tokio::spawn(async move {
                    let mut accumulated = String::new();
                    let mut aborted = false;

                    while let Some(item) = provider_rx.recv().await {
                        match item {
                            Ok(fragment) => {
                                accumulated.push_str(&fragment);
                                if tx.send(Ok(fragment)).await.is_err() {
                                    // Client gone; dropping the provider
                                    // receiver cancels the upstream task.
                                    aborted = true;
                                    break;
                                }
                            }
                            Err(e) => {
                                aborted = true;
                                let _ = tx.send(Err(e)).await;
                                break;
                            }
                        }
                    }

                    if aborted && accumulated.is_empty() {
                        return;
                    }
                    if let Err(e) = history
                        .save_message(&conversation, "assistant", &accumulated, &sources)
                        .await
                    {
                        tracing::error!(error = %e, "failed to persist streamed response");
                    }
                });
            }
        }

        Ok((conversation_id, rx))
    }

    /// Ordered message history; unknown conversation is a NotFound.
    pub async fn conversation_history(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<StoredMessage>, ApiError> {
        if !self.history.conversation_exists(conversation_id).await? {
            return Err(ApiError::NotFound(format!(
                "Conversation {} not found",
                conversation_id
            )));
        }
        self.history.get_messages(conversation_id).await
    }

    /// Shared front half of both paths: resolve the conversation, persist
    /// the user turn, and decide between a canned reply and a model call.
    async fn plan(
        &self,
        query: &str,
        conversation_id: Option<&str>,
        selected_text: Option<&str>,
    ) -> Result<(String, Plan), ApiError> {
        let conversation_id = conversation_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.history
            .get_or_create_conversation(&conversation_id)
            .await?;

        // History is read before the current query is persisted so the
        // query does not appear twice in the prompt.
        let prior = self
            .history
            .recent_messages(&conversation_id, HISTORY_WINDOW)
            .await?;
        self.history
            .save_message(&conversation_id, "user", query, &[])
            .await?;

        if is_greeting(query) {
            return Ok((conversation_id, Plan::Canned(GREETING_REPLY.to_string())));
        }

        let chunks = self.retrieval.retrieve(query, selected_text).await?;
        if chunks.is_empty() {
            let topics = self.probe_topics().await;
            return Ok((
                conversation_id,
                Plan::Canned(fallback_response(query, &topics)),
            ));
        }

        let request = GenerationRequest {
            system_prompt: build_system_prompt(&chunks, selected_text),
            history: prior
                .iter()
                .map(|m| ChatMessage::new(&m.role, &m.content))
                .collect(),
            query: query.to_string(),
            max_tokens: Some(self.max_response_length),
        };

        Ok((conversation_id, Plan::Generate { request, chunks }))
    }

    /// Distinct titles and section names from a few fixed probe retrievals,
    /// used to suggest what the corpus does cover. Probe failures are
    /// ignored; suggestions are best-effort.
    async fn probe_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = Vec::new();
        for probe in PROBE_QUERIES {
            if topics.len() >= MAX_SUGGESTED_TOPICS {
                break;
            }
            let Ok(chunks) = self.retrieval.retrieve(probe, None).await else {
                continue;
            };
            for chunk in &chunks {
                for candidate in [&chunk.title, &chunk.section] {
                    if !candidate.is_empty() && !topics.iter().any(|t| t == candidate.as_str()) {
                        topics.push(candidate.clone());
                        if topics.len() >= MAX_SUGGESTED_TOPICS {
                            return topics;
                        }
                    }
                }
            }
        }
        topics
    }
}

fn is_greeting(query: &str) -> bool {
    let normalized = query
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .to_lowercase();
    GREETINGS.contains(&normalized.as_str())
}

fn fallback_response(query: &str, topics: &[String]) -> String {
    let mut response = format!(
        "I couldn't find anything in the textbook about \"{}\".",
        query
    );
    if !topics.is_empty() {
        response.push_str(&format!(
            " You could try asking about topics like: {}.",
            topics.join(", ")
        ));
    }
    response
}

fn build_system_prompt(chunks: &[TextbookChunk], selected_text: Option<&str>) -> String {
    let context: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    let mut prompt = format!("{}\n\nContext:\n{}", SYSTEM_PROMPT, context.join("\n\n"));
    if let Some(selected) = selected_text {
        prompt.push_str(&format!(
            "\n\nThe user has highlighted this passage:\n{}",
            selected
        ));
    }
    prompt
}
