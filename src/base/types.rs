//! Common result aliases and the data transfer types exchanged with the
//! Assessment Module Manager and the LLM.

use std::sync::{Arc, Mutex};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

// Platform DTOs.
//
// These mirror the Assessment Module Manager's schema and pass through the
// module mostly unchanged; the module only ever adds `meta` entries.

/// An exercise as sent by the Assessment Module Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub max_points: f64,
    #[serde(default)]
    pub bonus_points: f64,
    #[serde(default)]
    pub problem_statement: Option<String>,
    #[serde(default)]
    pub example_solution: Option<String>,
    /// Free-text grading instructions, as entered by the instructor.
    #[serde(default)]
    pub grading_instructions: Option<String>,
    /// Structured criteria, when the instructor maintains them in the LMS.
    #[serde(default)]
    pub grading_criteria: Vec<GradingCriterion>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

/// A student submission for an exercise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub exercise_id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

/// Feedback on a submission: either a tutor's, or a suggestion produced here.
///
/// `index_start`/`index_end` reference a character range into the submission
/// text; unreferenced feedback leaves both empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default)]
    pub id: Option<i64>,
    pub exercise_id: i64,
    pub submission_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub index_start: Option<usize>,
    #[serde(default)]
    pub index_end: Option<usize>,
    #[serde(default)]
    pub credits: f64,
    #[serde(default)]
    pub structured_grading_instruction_id: Option<i64>,
    #[serde(default)]
    pub is_graded: Option<bool>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

/// A grading criterion with its structured instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GradingCriterion {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub structured_grading_instructions: Vec<GradingInstruction>,
}

/// One way a criterion can be applied, with the credits it awards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GradingInstruction {
    pub id: i64,
    pub credits: f64,
    #[serde(default)]
    pub grading_scale: String,
    #[serde(default)]
    pub instruction_description: String,
    #[serde(default)]
    pub feedback: String,
    /// How often the instruction may be applied to one submission; 0 means
    /// unlimited.
    #[serde(default)]
    pub usage_count: i64,
}

/// The machine-parseable breakdown of an exercise's grading instructions,
/// derived once per exercise and cached by content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StructuredGradingCriterion {
    pub criteria: Vec<GradingCriterion>,
}

// LLM-facing output types.

/// One feedback suggestion as produced by the model.
///
/// Line references are 1-based into the numbered submission handed to the
/// model and are mapped back to character ranges afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackModel {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub line_start: Option<u32>,
    #[serde(default)]
    pub line_end: Option<u32>,
    #[serde(default)]
    pub credits: f64,
    #[serde(default)]
    pub grading_instruction_id: Option<i64>,
}

/// Collection of feedback suggestions making up an assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentModel {
    pub feedbacks: Vec<FeedbackModel>,
}

// Per-request metadata.

/// Accumulates debug artifacts (prompts, raw results, omitted prompt
/// features) while a request is processed, so they can be attached to the
/// response `meta`.
///
/// Trivially cloneable; all clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MetaSink {
    entries: Arc<Mutex<Map<String, Value>>>,
}

impl MetaSink {
    pub fn emit(&self, key: &str, value: Value) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.entries.lock().unwrap().clone()
    }
}
