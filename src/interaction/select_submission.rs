//! Propose which submission a tutor should assess next.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    base::types::Submission,
    interaction::{ApiError, ModuleResponse},
    runtime::Runtime,
};

#[derive(Debug, Deserialize)]
pub struct SelectSubmissionRequest {
    pub exercise: crate::base::types::Exercise,
    pub submission_ids: Vec<i64>,
}

/// Pick the stored submission with the fewest existing suggestions, breaking
/// ties by the lowest id. Returns `-1` when none of the requested ids is
/// known to the module.
pub async fn handle(State(runtime): State<Runtime>, Json(request): Json<SelectSubmissionRequest>) -> Result<ModuleResponse<i64>, ApiError> {
    let submissions = runtime.db.get_submissions(request.exercise.id, &request.submission_ids).await?;

    if submissions.len() < request.submission_ids.len() {
        warn!("Only {} of {} requested submissions are stored for exercise {}.", submissions.len(), request.submission_ids.len(), request.exercise.id);
    }

    let Some(selected) = select(&runtime, &submissions).await? else {
        info!("No selectable submission for exercise {}.", request.exercise.id);

        return Ok(ModuleResponse::plain(-1));
    };

    Ok(ModuleResponse::plain(selected))
}

async fn select(runtime: &Runtime, submissions: &[Submission]) -> Result<Option<i64>, ApiError> {
    let mut best: Option<(usize, i64)> = None;

    for submission in submissions {
        let count = runtime.db.count_suggestions(submission.exercise_id, submission.id).await?;

        let better = match best {
            None => true,
            Some((best_count, best_id)) => count < best_count || (count == best_count && submission.id < best_id),
        };

        if better {
            best = Some((count, submission.id));
        }
    }

    Ok(best.map(|(_, id)| id))
}
