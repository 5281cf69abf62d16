//! Ingest the submissions of an exercise.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::info;

use crate::{
    base::types::{Exercise, Submission},
    interaction::{ApiError, ModuleResponse},
    runtime::Runtime,
};

#[derive(Debug, Deserialize)]
pub struct SubmissionsRequest {
    pub exercise: Exercise,
    pub submissions: Vec<Submission>,
}

/// Store the incoming submissions, merging metadata into any already stored.
pub async fn handle(State(runtime): State<Runtime>, Json(request): Json<SubmissionsRequest>) -> Result<ModuleResponse<serde_json::Value>, ApiError> {
    info!("Received {} submission(s) for exercise {}.", request.submissions.len(), request.exercise.id);

    runtime.db.store_submissions(&request.exercise, &request.submissions).await?;

    Ok(ModuleResponse::plain(serde_json::Value::Null))
}
