//! The divide-and-conquer approach: the structured grading criteria are
//! resolved first, then one assessment call per criterion runs concurrently
//! and the results are merged.

use futures::future::join_all;
use tracing::warn;

use crate::{
    base::types::{AssessmentModel, Exercise, Feedback, GradingCriterion, Res, Submission},
    grading::{
        DivideAndConquerApproach, GradingContext, assessment_schema, criteria, feedback_from_model, instruction_ids,
        lines::number_lines,
        prompt::{ChatPrompt, PromptInput, check_length_and_omit, render_criterion},
    },
    service::llm::CompletionRequest,
};

/// Generate feedback suggestions with one concurrent call per criterion.
///
/// A criterion whose call fails yields no suggestions instead of failing the
/// whole assessment. Criteria named after plagiarism checks are skipped since
/// they cannot be judged from the submission text alone.
pub async fn generate_suggestions(exercise: &Exercise, submission: &Submission, approach: &DivideAndConquerApproach, is_graded: bool, ctx: &GradingContext<'_>) -> Res<Vec<Feedback>> {
    let criteria = criteria::structured_grading_criteria(exercise, approach.model, ctx).await?;
    let valid_ids = instruction_ids(&criteria);

    let assessed: Vec<&GradingCriterion> = criteria
        .criteria
        .iter()
        .filter(|criterion| {
            let skip = criterion.title.as_deref().is_some_and(|title| title.to_lowercase().contains("plagiarism"));

            if skip {
                warn!("Skipping plagiarism criterion {} for exercise {}.", criterion.id, exercise.id);
            }

            !skip
        })
        .collect();

    let results = join_all(assessed.iter().map(|criterion| assess_criterion(exercise, submission, criterion, approach, ctx))).await;

    let mut feedbacks = Vec::new();

    for (criterion, result) in assessed.iter().zip(results) {
        match result {
            Ok(assessment) => {
                feedbacks.extend(assessment.feedbacks.into_iter().map(|model| feedback_from_model(model, exercise, submission, &valid_ids, is_graded)));
            }
            Err(err) => {
                warn!("Assessment of criterion {} failed for submission {}: {err}", criterion.id, submission.id);
            }
        }
    }

    Ok(feedbacks)
}

/// Assess the submission against one criterion.
async fn assess_criterion(exercise: &Exercise, submission: &Submission, criterion: &GradingCriterion, approach: &DivideAndConquerApproach, ctx: &GradingContext<'_>) -> Res<AssessmentModel> {
    let prompt = ChatPrompt {
        system: &approach.system_message,
        user: &approach.human_message,
    };

    let mut input = PromptInput::default()
        .with("problem_statement", exercise.problem_statement.as_deref().unwrap_or("No problem statement."))
        .with("criterion", render_criterion(criterion))
        .with("max_points", exercise.max_points.to_string())
        .with("bonus_points", exercise.bonus_points.to_string())
        .with("submission", number_lines(&submission.text));

    if !check_length_and_omit(&prompt, &mut input, approach.max_input_tokens, &["problem_statement"], ctx.debug, ctx.meta) {
        return Err(anyhow::anyhow!("Input too long even after omitting features."));
    }

    let (system, user) = prompt.render(&input);
    let request = CompletionRequest {
        system,
        user,
        model: ctx.config.resolve_model(approach.model).to_string(),
    };

    let assessment: AssessmentModel = ctx.llm.predict_and_parse(&request, assessment_schema()).await?;

    if ctx.debug {
        ctx.meta.emit(&format!("criterion_{}_prompt", criterion.id), serde_json::json!({ "system": request.system, "user": request.user }));
        ctx.meta.emit(&format!("criterion_{}_result", criterion.id), serde_json::to_value(&assessment)?);
    }

    Ok(assessment)
}
