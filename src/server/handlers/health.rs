use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// Liveness plus reachability of the vector store and the database.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let vector_store = state.vector_store.health().await;
    let database = state.history.health().await;
    let total_messages = state.history.message_count().await.unwrap_or(0);

    Json(json!({
        "status": if vector_store && database { "ok" } else { "degraded" },
        "vector_store": vector_store,
        "database": database,
        "total_messages": total_messages,
    }))
}
