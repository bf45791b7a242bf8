use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

/// Ordered message history for one conversation. Malformed ids are a 400,
/// unknown conversations a 404.
pub async fn conversation_history(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if uuid::Uuid::parse_str(&conversation_id).is_err() {
        return Err(ApiError::BadRequest(
            "conversation_id must be a valid UUID".into(),
        ));
    }

    let messages = state.chat.conversation_history(&conversation_id).await?;
    Ok(Json(json!({
        "conversation_id": conversation_id,
        "messages": messages,
    })))
}
