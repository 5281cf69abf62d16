//! The basic approach: one structured-output call over the whole submission.

use tracing::warn;

use crate::{
    base::types::{AssessmentModel, Exercise, Feedback, Res, StructuredGradingCriterion, Submission},
    grading::{
        BasicApproach, GradingContext, assessment_schema, feedback_from_model, instruction_ids,
        lines::number_lines,
        prompt::{ChatPrompt, OMITTABLE_FEATURES, PromptInput, check_length_and_omit, format_grading_instructions},
    },
    service::llm::CompletionRequest,
};

/// Generate feedback suggestions with a single assessment call.
pub async fn generate_suggestions(exercise: &Exercise, submission: &Submission, approach: &BasicApproach, is_graded: bool, ctx: &GradingContext<'_>) -> Res<Vec<Feedback>> {
    let prompt = ChatPrompt {
        system: &approach.system_message,
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

        return Ok(Vec::new());
    }

    let (system, user) = prompt.render(&input);
    let request = CompletionRequest {
        system,
        user,
        model: ctx.config.resolve_model(approach.model).to_string(),
    };

    let assessment: AssessmentModel = ctx.llm.predict_and_parse(&request, assessment_schema()).await?;

    if ctx.debug {
        ctx.meta.emit("suggestion_prompt", serde_json::json!({ "system": request.system, "user": request.user }));
        ctx.meta.emit("suggestion_result", serde_json::to_value(&assessment)?);
    }

    let criteria = StructuredGradingCriterion {
        criteria: exercise.grading_criteria.clone(),
    };
    let valid_ids = instruction_ids(&criteria);

    Ok(assessment.feedbacks.into_iter().map(|model| feedback_from_model(model, exercise, submission, &valid_ids, is_graded)).collect())
}
