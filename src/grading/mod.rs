//! The feedback-suggestion pipeline: config-driven approach selection,
//! prompt construction, LLM invocation with structured output, and mapping
//! of model output back onto the submission.

pub mod basic;
pub mod chain_of_thought;
pub mod criteria;
pub mod divide_and_conquer;
pub mod lines;
pub mod prompt;

use std::{collections::HashSet, sync::OnceLock};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    base::{
        config::{Config, ModelRole},
        prompts,
        types::{Exercise, Feedback, FeedbackModel, MetaSink, Res, StructuredGradingCriterion, Submission},
    },
    service::{
        db::DbClient,
        llm::{LlmClient, ResponseSchema},
    },
};

/// Module configuration, overridable per request via the `X-Module-Config`
/// header. Its JSON schema is served at `/config_schema`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Configuration {
    /// Attach prompts and raw results to the response `meta`.
    pub debug: bool,
    /// The approach used to generate feedback suggestions.
    pub approach: ApproachConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            debug: false,
            approach: ApproachConfig::Basic(BasicApproach::default()),
        }
    }
}

/// The available grading approaches, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApproachConfig {
    Basic(BasicApproach),
    ChainOfThought(ChainOfThoughtApproach),
    DivideAndConquer(DivideAndConquerApproach),
}

fn default_max_input_tokens() -> usize {
    3000
}

/// One structured-output call over the whole submission.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BasicApproach {
    /// Maximum number of estimated tokens in the input prompt.
    pub max_input_tokens: usize,
    pub model: ModelRole,
    pub system_message: String,
    pub human_message: String,
}

impl Default for BasicApproach {
    fn default() -> Self {
        Self {
            max_input_tokens: default_max_input_tokens(),
            model: ModelRole::Base,
            system_message: prompts::SUGGESTIONS_SYSTEM_MESSAGE.to_string(),
            human_message: prompts::SUGGESTIONS_HUMAN_MESSAGE.to_string(),
        }
    }
}

/// A thinking call drafts the assessment, a review call finalizes it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ChainOfThoughtApproach {
    pub max_input_tokens: usize,
    /// Model for the draft; defaults to the fast-reasoning role.
    pub thinking_model: ModelRole,
    /// Model for the final review.
    pub review_model: ModelRole,
    pub thinking_system_message: String,
    pub review_system_message: String,
    pub human_message: String,
}

impl Default for ChainOfThoughtApproach {
    fn default() -> Self {
        Self {
            max_input_tokens: default_max_input_tokens(),
            thinking_model: ModelRole::FastReasoning,
            review_model: ModelRole::Base,
            thinking_system_message: prompts::THINKING_SYSTEM_MESSAGE.to_string(),
            review_system_message: prompts::REVIEW_SYSTEM_MESSAGE.to_string(),
            human_message: prompts::THINKING_HUMAN_MESSAGE.to_string(),
        }
    }
}

/// One independent call per grading criterion, fanned out concurrently.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DivideAndConquerApproach {
    pub max_input_tokens: usize,
    pub model: ModelRole,
    pub system_message: String,
    pub human_message: String,
}

impl Default for DivideAndConquerApproach {
    fn default() -> Self {
        Self {
            max_input_tokens: default_max_input_tokens(),
            model: ModelRole::Base,
            system_message: prompts::CRITERION_SYSTEM_MESSAGE.to_string(),
            human_message: prompts::SUGGESTIONS_HUMAN_MESSAGE.to_string(),
        }
    }
}

/// Shared clients and per-request state the approaches operate with.
pub struct GradingContext<'a> {
    pub config: &'a Config,
    pub llm: &'a LlmClient,
    pub db: &'a DbClient,
    pub meta: &'a MetaSink,
    pub debug: bool,
}

/// Generate feedback suggestions with the configured approach.
pub async fn generate_suggestions(exercise: &Exercise, submission: &Submission, configuration: &Configuration, is_graded: bool, ctx: &GradingContext<'_>) -> Res<Vec<Feedback>> {
    match &configuration.approach {
        ApproachConfig::Basic(approach) => basic::generate_suggestions(exercise, submission, approach, is_graded, ctx).await,
        ApproachConfig::ChainOfThought(approach) => chain_of_thought::generate_suggestions(exercise, submission, approach, is_graded, ctx).await,
        ApproachConfig::DivideAndConquer(approach) => divide_and_conquer::generate_suggestions(exercise, submission, approach, is_graded, ctx).await,
    }
}

// Structured-output schemas.

static ASSESSMENT_SCHEMA: OnceLock<ResponseSchema> = OnceLock::new();
static CRITERIA_SCHEMA: OnceLock<ResponseSchema> = OnceLock::new();

/// Strict response schema for an [`crate::base::types::AssessmentModel`].
pub fn assessment_schema() -> &'static ResponseSchema {
    ASSESSMENT_SCHEMA.get_or_init(|| ResponseSchema {
        name: "AssessmentModel".to_string(),
        description: "Collection of feedback suggestions making up an assessment.".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "feedbacks": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string", "description": "Very short title, e.g. a feedback category." },
                            "description": { "type": "string", "description": "Feedback description." },
                            "line_start": { "type": ["integer", "null"], "description": "Referenced line number start, or null if unreferenced." },
                            "line_end": { "type": ["integer", "null"], "description": "Referenced line number end, or null if unreferenced." },
                            "credits": { "type": "number", "description": "Number of points received/deducted." },
                            "grading_instruction_id": { "type": ["integer", "null"], "description": "ID of the grading instruction that backs this feedback, or null." }
                        },
                        "required": ["title", "description", "line_start", "line_end", "credits", "grading_instruction_id"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["feedbacks"],
            "additionalProperties": false
        }),
    })
}

/// Strict response schema for a [`StructuredGradingCriterion`].
pub fn criteria_schema() -> &'static ResponseSchema {
    CRITERIA_SCHEMA.get_or_init(|| ResponseSchema {
        name: "StructuredGradingCriterion".to_string(),
        description: "Machine-parseable breakdown of an exercise's grading instructions.".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "criteria": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "title": { "type": ["string", "null"] },
                            "structured_grading_instructions": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "id": { "type": "integer", "description": "Stable numeric id for the instruction." },
                                        "credits": { "type": "number" },
                                        "grading_scale": { "type": "string" },
                                        "instruction_description": { "type": "string" },
                                        "feedback": { "type": "string", "description": "Feedback text to use when the instruction applies." },
                                        "usage_count": { "type": "integer", "description": "How often the instruction may apply; 0 means unlimited." }
                                    },
                                    "required": ["id", "credits", "grading_scale", "instruction_description", "feedback", "usage_count"],
                                    "additionalProperties": false
                                }
                            }
                        },
                        "required": ["id", "title", "structured_grading_instructions"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["criteria"],
            "additionalProperties": false
        }),
    })
}

// Feedback mapping.

/// All instruction ids contained in the criteria set; feedback may only
/// reference these.
pub fn instruction_ids(criteria: &StructuredGradingCriterion) -> HashSet<i64> {
    criteria.criteria.iter().flat_map(|criterion| criterion.structured_grading_instructions.iter().map(|instruction| instruction.id)).collect()
}

/// Convert a model feedback into a platform [`Feedback`] on the submission.
///
/// Line references become character ranges; a `grading_instruction_id` the
/// exercise does not actually contain is dropped.
pub fn feedback_from_model(model: FeedbackModel, exercise: &Exercise, submission: &Submission, valid_instruction_ids: &HashSet<i64>, is_graded: bool) -> Feedback {
    let (index_start, index_end) = match lines::index_range_for_lines(&submission.text, model.line_start, model.line_end) {
        Some((start, end)) => (Some(start), Some(end)),
        None => (None, None),
    };

    Feedback {
        id: None,
        exercise_id: exercise.id,
        submission_id: submission.id,
        title: model.title,
        description: model.description,
        index_start,
        index_end,
        credits: model.credits,
        structured_grading_instruction_id: model.grading_instruction_id.filter(|id| valid_instruction_ids.contains(id)),
        is_graded: Some(is_graded),
        meta: serde_json::Map::new(),
    }
}
