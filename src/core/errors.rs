use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("embedding failed ({provider}): {message}")]
    Embedding { provider: String, message: String },
    #[error("retrieval failed: {0}")]
    Retrieval(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }

    pub fn embedding<E: std::fmt::Display>(provider: &str, err: E) -> Self {
        ApiError::Embedding {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests".to_string(),
            ),
            // Provider and infrastructure failures are logged with full
            // detail but reported generically to the caller.
            ApiError::Config(_)
            | ApiError::Embedding { .. }
            | ApiError::Retrieval(_)
            | ApiError::Generation(_)
            | ApiError::Internal(_) => {
                tracing::error!("request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_error_carries_provider_name() {
        let err = ApiError::embedding("cohere", "connection refused");
        assert_eq!(
            err.to_string(),
            "embedding failed (cohere): connection refused"
        );
    }

    #[test]
    fn bad_request_maps_to_400() {
        let response = ApiError::BadRequest("Query cannot be empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn provider_failures_do_not_leak_detail() {
        let response = ApiError::Generation("upstream returned 502".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
