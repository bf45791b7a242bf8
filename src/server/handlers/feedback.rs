use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub message_id: String,
    pub rating: i32,
    pub comment: Option<String>,
}

fn validate(request: &FeedbackRequest) -> Result<(), ApiError> {
    if uuid::Uuid::parse_str(&request.message_id).is_err() {
        return Err(ApiError::BadRequest(
            "message_id must be a valid UUID".into(),
        ));
    }
    if !(-1..=1).contains(&request.rating) {
        return Err(ApiError::BadRequest(
            "rating must be -1, 0 or 1".into(),
        ));
    }
    Ok(())
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FeedbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&request)?;

    state
        .history
        .save_feedback(
            &request.message_id,
            request.rating,
            request.comment.as_deref(),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Feedback recorded",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(message_id: &str, rating: i32) -> FeedbackRequest {
        FeedbackRequest {
            message_id: message_id.to_string(),
            rating,
            comment: None,
        }
    }

    #[test]
    fn out_of_range_ratings_are_rejected() {
        let id = uuid::Uuid::new_v4().to_string();
        assert!(matches!(
            validate(&request(&id, 2)),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            validate(&request(&id, -2)),
            Err(ApiError::BadRequest(_))
        ));
        for rating in [-1, 0, 1] {
            assert!(validate(&request(&id, rating)).is_ok());
        }
    }

    #[test]
    fn malformed_message_ids_are_rejected() {
        assert!(matches!(
            validate(&request("not-a-uuid", 1)),
            Err(ApiError::BadRequest(_))
        ));
    }
}
