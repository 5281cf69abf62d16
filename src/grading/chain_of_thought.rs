//! The chain-of-thought approach: a reasoning model drafts the assessment,
//! a second call reviews and finalizes it.

use tracing::warn;

use crate::{
    base::types::{AssessmentModel, Exercise, Feedback, Res, StructuredGradingCriterion, Submission},
    grading::{
        ChainOfThoughtApproach, GradingContext, assessment_schema, feedback_from_model, instruction_ids,
        lines::number_lines,
        prompt::{ChatPrompt, OMITTABLE_FEATURES, PromptInput, check_length_and_omit, format_grading_instructions},
    },
    service::llm::CompletionRequest,
};

/// Generate feedback suggestions with a draft and a review call.
pub async fn generate_suggestions(exercise: &Exercise, submission: &Submission, approach: &ChainOfThoughtApproach, is_graded: bool, ctx: &GradingContext<'_>) -> Res<Vec<Feedback>> {
    let draft = match draft_assessment(exercise, submission, approach, ctx).await? {
        Some(draft) => draft,
        None => return Ok(Vec::new()),
    };

    let assessment = review_assessment(exercise, submission, approach, &draft, ctx).await?;

    let criteria = StructuredGradingCriterion {
        criteria: exercise.grading_criteria.clone(),
    };
    let valid_ids = instruction_ids(&criteria);

    Ok(assessment.feedbacks.into_iter().map(|model| feedback_from_model(model, exercise, submission, &valid_ids, is_graded)).collect())
}

/// The thinking call. `None` when the prompt is over budget even after
/// feature omission.
async fn draft_assessment(exercise: &Exercise, submission: &Submission, approach: &ChainOfThoughtApproach, ctx: &GradingContext<'_>) -> Res<Option<AssessmentModel>> {
    let prompt = ChatPrompt {
        system: &approach.thinking_system_message,
        user: &approach.human_message,
    };

    let mut input = PromptInput::default()
        .with("problem_statement", exercise.problem_statement.as_deref().unwrap_or("No problem statement."))
        .with("example_solution", exercise.example_solution.as_deref().unwrap_or("No example solution."))
        .with("grading_instructions", format_grading_instructions(exercise))
        .with("max_points", exercise.max_points.to_string())
        .with("bonus_points", exercise.bonus_points.to_string())
        .with("submission", number_lines(&submission.text));

    if !check_length_and_omit(&prompt, &mut input, approach.max_input_tokens, OMITTABLE_FEATURES, ctx.debug, ctx.meta) {
        warn!("Input too long even after omitting features, skipping submission {}.", submission.id);

        return Ok(None);
    }

    let (system, user) = prompt.render(&input);
    let request = CompletionRequest {
        system,
        user,
        model: ctx.config.resolve_model(approach.thinking_model).to_string(),
    };

    let draft: AssessmentModel = ctx.llm.predict_and_parse(&request, assessment_schema()).await?;

    if ctx.debug {
        ctx.meta.emit("thinking_prompt", serde_json::json!({ "system": request.system, "user": request.user }));
        ctx.meta.emit("thinking_result", serde_json::to_value(&draft)?);
    }

    Ok(Some(draft))
}

/// The review call, fed the rendered draft.
async fn review_assessment(exercise: &Exercise, submission: &Submission, approach: &ChainOfThoughtApproach, draft: &AssessmentModel, ctx: &GradingContext<'_>) -> Res<AssessmentModel> {
    let prompt = ChatPrompt {
        system: &approach.review_system_message,
        user: &approach.human_message,
    };

    let mut input = PromptInput::default()
        .with("grading_instructions", format_grading_instructions(exercise))
        .with("max_points", exercise.max_points.to_string())
        .with("bonus_points", exercise.bonus_points.to_string())
        .with("draft", serde_json::to_string_pretty(draft)?)
        .with("submission", number_lines(&submission.text));

    // The review prompt carries no problem statement or example solution;
    // only the instructions are left to omit.
    if !check_length_and_omit(&prompt, &mut input, approach.max_input_tokens, &["grading_instructions"], ctx.debug, ctx.meta) {
        warn!("Review prompt over budget for submission {}, keeping the draft assessment.", submission.id);

        return Ok(draft.clone());
    }

    let (system, user) = prompt.render(&input);
    let request = CompletionRequest {
        system,
        user,
        model: ctx.config.resolve_model(approach.review_model).to_string(),
    };

    let assessment: AssessmentModel = ctx.llm.predict_and_parse(&request, assessment_schema()).await?;

    if ctx.debug {
        ctx.meta.emit("review_prompt", serde_json::json!({ "system": request.system, "user": request.user }));
        ctx.meta.emit("review_result", serde_json::to_value(&assessment)?);
    }

    Ok(assessment)
}
