//! Ingest tutor feedback so future suggestions can learn from it.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::info;

use crate::{
    base::types::{Exercise, Feedback, Submission},
    interaction::{ApiError, ModuleResponse},
    runtime::Runtime,
};

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub exercise: Exercise,
    pub submission: Submission,
    pub feedback: Feedback,
}

/// Store one piece of tutor-given feedback.
pub async fn handle(State(runtime): State<Runtime>, Json(request): Json<FeedbackRequest>) -> Result<ModuleResponse<serde_json::Value>, ApiError> {
    info!("Received feedback for submission {} of exercise {}.", request.submission.id, request.exercise.id);

    runtime.db.store_feedback(&request.feedback).await?;

    Ok(ModuleResponse::plain(serde_json::Value::Null))
}
