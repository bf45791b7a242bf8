use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chat, feedback, health, history};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat/query", post(chat::query))
        .route("/api/chat/stream", post(chat::stream))
        .route(
            "/api/chat/history/:conversation_id",
            get(history::conversation_history),
        )
        .route("/api/feedback", post(feedback::submit))
        .route("/api/health", get(health::health))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
