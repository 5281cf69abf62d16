//! Structured grading criteria: passthrough of platform-provided criteria,
//! otherwise LLM derivation from the free-text grading instructions with a
//! hash-keyed cache.

use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::{
    base::{
        config::ModelRole,
        prompts,
        types::{Exercise, Res, StructuredGradingCriterion},
    },
    grading::{GradingContext, criteria_schema, prompt::PromptInput},
    service::llm::CompletionRequest,
};

/// Hash of every exercise feature the structured criteria are derived from.
/// Cached criteria are only reused while this hash matches, so any change to
/// the instructions invalidates the cache.
pub fn instructions_hash(exercise: &Exercise) -> String {
    // Value::Object keeps keys sorted, so serialization is canonical.
    let canonical = json!({
        "bonus_points": exercise.bonus_points,
        "example_solution": exercise.example_solution,
        "grading_instructions": exercise.grading_instructions,
        "max_points": exercise.max_points,
        "problem_statement": exercise.problem_statement,
    });

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());

    format!("{:x}", hasher.finalize())
}

/// Get the structured grading criteria for an exercise.
///
/// Criteria the platform already provides are passed through untouched. All
/// other exercises get LLM-derived criteria, cached per exercise under the
/// instructions hash.
pub async fn structured_grading_criteria(exercise: &Exercise, model: ModelRole, ctx: &GradingContext<'_>) -> Res<StructuredGradingCriterion> {
    if !exercise.grading_criteria.is_empty() {
        debug!("Exercise {} provides grading criteria, skipping derivation.", exercise.id);

        return Ok(StructuredGradingCriterion {
            criteria: exercise.grading_criteria.clone(),
        });
    }

    let hash = instructions_hash(exercise);

    if let Some(cached) = ctx.db.get_cached_criteria(exercise.id, &hash).await? {
        debug!("Using cached grading criteria for exercise {}.", exercise.id);

        return Ok(cached);
    }

    let criteria = derive_criteria(exercise, model, ctx).await?;

    ctx.db.cache_criteria(exercise.id, &hash, &criteria).await?;
    info!("Derived and cached grading criteria for exercise {}.", exercise.id);

    Ok(criteria)
}

/// Derive criteria from the exercise's instructions via a structured LLM call.
async fn derive_criteria(exercise: &Exercise, model: ModelRole, ctx: &GradingContext<'_>) -> Res<StructuredGradingCriterion> {
    let input = PromptInput::default()
        .with("problem_statement", exercise.problem_statement.as_deref().unwrap_or("No problem statement."))
        .with("example_solution", exercise.example_solution.as_deref().unwrap_or("No example solution."))
        .with("grading_instructions", exercise.grading_instructions.as_deref().unwrap_or("No grading instructions."))
        .with("max_points", exercise.max_points.to_string())
        .with("bonus_points", exercise.bonus_points.to_string());

    let request = CompletionRequest {
        system: input.render(prompts::CRITERIA_SYSTEM_MESSAGE),
        user: input.render(prompts::CRITERIA_HUMAN_MESSAGE),
        model: ctx.config.resolve_model(model).to_string(),
    };

    let criteria: StructuredGradingCriterion = ctx.llm.predict_and_parse(&request, criteria_schema()).await?;

    if criteria.criteria.is_empty() {
        return Err(anyhow::anyhow!("Model returned no grading criteria for exercise {}.", exercise.id));
    }

    if ctx.debug {
        ctx.meta.emit("derived_grading_criteria", serde_json::to_value(&criteria)?);
    }

    Ok(criteria)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise() -> Exercise {
        Exercise {
            id: 3,
            title: "Essay".to_string(),
            max_points: 10.0,
            bonus_points: 2.0,
            problem_statement: Some("Explain polymorphism.".to_string()),
            example_solution: Some("Polymorphism is...".to_string()),
            grading_instructions: Some("2 points per concept.".to_string()),
            grading_criteria: Vec::new(),
            meta: serde_json::Map::new(),
        }
    }

    #[test]
    fn hash_is_stable_for_equal_instructions() {
        assert_eq!(instructions_hash(&exercise()), instructions_hash(&exercise()));
    }

    #[test]
    fn hash_changes_with_any_derivation_input() {
        let base = instructions_hash(&exercise());

        let mut changed = exercise();
        changed.grading_instructions = Some("3 points per concept.".to_string());
        assert_ne!(instructions_hash(&changed), base);

        let mut changed = exercise();
        changed.max_points = 12.0;
        assert_ne!(instructions_hash(&changed), base);

        let mut changed = exercise();
        changed.example_solution = None;
        assert_ne!(instructions_hash(&changed), base);
    }

    #[test]
    fn hash_ignores_unrelated_exercise_fields() {
        let base = instructions_hash(&exercise());

        let mut changed = exercise();
        changed.title = "Renamed".to_string();
        assert_eq!(instructions_hash(&changed), base);
    }
}
