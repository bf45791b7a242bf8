//! Chat endpoints: blocking query and SSE streaming.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::chat::ChatResponse;
use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub conversation_id: Option<String>,
    pub selected_text: Option<String>,
    #[allow(dead_code)]
    pub page_url: Option<String>,
}

/// Boundary validation; rejected requests have no side effects.
fn validate(request: &ChatRequest, max_query_length: usize) -> Result<(), ApiError> {
    let length = request.query.chars().count();
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query cannot be empty".into()));
    }
    if length > max_query_length {
        return Err(ApiError::BadRequest(format!(
            "Query exceeds the maximum length of {} characters",
            max_query_length
        )));
    }
    if let Some(id) = &request.conversation_id {
        if uuid::Uuid::parse_str(id).is_err() {
            return Err(ApiError::BadRequest(
                "conversation_id must be a valid UUID".into(),
            ));
        }
    }
    Ok(())
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    state.check_rate_limit()?;
    validate(&request, state.settings.max_query_length)?;

    let response = state
        .chat
        .process_query(
            &request.query,
            request.conversation_id.as_deref(),
            request.selected_text.as_deref(),
        )
        .await?;
    Ok(Json(response))
}

/// Streams the answer as SSE data events, one fragment per event. The first
/// event carries the conversation id so a client without one can continue
/// the conversation.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    state.check_rate_limit()?;
    validate(&request, state.settings.max_query_length)?;

    let (conversation_id, rx) = state
        .chat
        .stream_response(
            &request.query,
            request.conversation_id.as_deref(),
            request.selected_text.as_deref(),
        )
        .await?;

    let header = stream::once(async move {
        Ok(Event::default()
            .event("conversation")
            .data(conversation_id))
    });
    let body = stream::unfold(rx, |mut rx: mpsc::Receiver<Result<String, ApiError>>| async {
        match rx.recv().await {
            Some(Ok(fragment)) => Some((Ok(Event::default().data(fragment)), rx)),
            Some(Err(e)) => {
                tracing::error!(error = %e, "stream generation failed");
                Some((
                    Ok(Event::default().event("error").data("generation failed")),
                    rx,
                ))
            }
            None => None,
        }
    });

    Ok(Sse::new(header.chain(body)).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(query: &str, conversation_id: Option<&str>) -> ChatRequest {
        ChatRequest {
            query: query.to_string(),
            conversation_id: conversation_id.map(str::to_string),
            selected_text: None,
            page_url: None,
        }
    }

    #[test]
    fn empty_and_oversize_queries_are_rejected() {
        assert!(matches!(
            validate(&request("", None), 1000),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            validate(&request("   ", None), 1000),
            Err(ApiError::BadRequest(_))
        ));
        let long = "x".repeat(1001);
        assert!(matches!(
            validate(&request(&long, None), 1000),
            Err(ApiError::BadRequest(_))
        ));
        assert!(validate(&request(&"x".repeat(1000), None), 1000).is_ok());
    }

    #[test]
    fn conversation_id_must_be_a_uuid() {
        assert!(matches!(
            validate(&request("query", Some("not-a-uuid")), 1000),
            Err(ApiError::BadRequest(_))
        ));
        let id = uuid::Uuid::new_v4().to_string();
        assert!(validate(&request("query", Some(&id)), 1000).is_ok());
    }

    #[test]
    fn length_limit_counts_chars_not_bytes() {
        // 10 multibyte chars are 30 bytes but must pass a limit of 10.
        let query = "日".repeat(10);
        assert!(validate(&request(&query, None), 10).is_ok());
    }
}
