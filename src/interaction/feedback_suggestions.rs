//! Generate feedback suggestions for a submission.

use axum::{Json, extract::State, http::HeaderMap};
use serde::Deserialize;
use tracing::info;

use crate::{
    base::types::{Exercise, Feedback, MetaSink, Submission},
    grading::{self, GradingContext},
    interaction::{ApiError, ModuleResponse, module_config_from_headers},
    runtime::Runtime,
};

fn default_is_graded() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct FeedbackSuggestionsRequest {
    pub exercise: Exercise,
    pub submission: Submission,
    /// Whether the suggestions are for a graded assessment; suggestions are
    /// tagged with this flag.
    #[serde(default = "default_is_graded")]
    pub is_graded: bool,
}

/// Run the configured grading approach and return its suggestions.
pub async fn handle(State(runtime): State<Runtime>, headers: HeaderMap, Json(request): Json<FeedbackSuggestionsRequest>) -> Result<ModuleResponse<Vec<Feedback>>, ApiError> {
    let configuration = module_config_from_headers(&headers, &runtime.config).map_err(ApiError::bad_request)?;

    info!("Generating suggestions for submission {} of exercise {}.", request.submission.id, request.exercise.id);

    // Suggestions may be requested for submissions that were never sent to
    // `/submissions`, so store this one as well.
    runtime.db.store_submissions(&request.exercise, std::slice::from_ref(&request.submission)).await?;

    let meta = MetaSink::default();
    let ctx = GradingContext {
        config: &runtime.config,
        llm: &runtime.llm,
        db: &runtime.db,
        meta: &meta,
        debug: configuration.debug,
    };

    let suggestions = grading::generate_suggestions(&request.exercise, &request.submission, &configuration, request.is_graded, &ctx).await?;

    runtime.db.store_suggestions(&suggestions).await?;
    info!("Generated {} suggestion(s) for submission {}.", suggestions.len(), request.submission.id);

    Ok(ModuleResponse::new(suggestions, meta.snapshot()))
}
