//! Prompt assembly: placeholder filling, input-token estimation, and
//! feature omission when the prompt exceeds the approach's token budget.

use std::collections::BTreeMap;

use serde_json::json;
use tracing::debug;

use crate::base::types::{Exercise, GradingCriterion, MetaSink};

/// Rough chars-per-token ratio used to estimate prompt length against
/// `max_input_tokens`. No tokenizer is involved; the estimate only has to be
/// good enough for budget checks.
pub const APPROX_CHARS_PER_TOKEN: usize = 4;

/// Prompt features that may be dropped when the input is too long, ordered
/// by priority (least important first). Omitted features are replaced with
/// "omitted" in the prompt.
pub const OMITTABLE_FEATURES: &[&str] = &["example_solution", "problem_statement", "grading_instructions"];

/// Estimated token count of a text.
pub fn estimated_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(APPROX_CHARS_PER_TOKEN)
}

/// A system/user template pair with `{placeholder}` markers.
#[derive(Debug, Clone, Copy)]
pub struct ChatPrompt<'a> {
    pub system: &'a str,
    pub user: &'a str,
}

impl ChatPrompt<'_> {
    /// Render both templates with the given input.
    pub fn render(&self, input: &PromptInput) -> (String, String) {
        (input.render(self.system), input.render(self.user))
    }

    fn estimated_tokens(&self, input: &PromptInput) -> usize {
        let (system, user) = self.render(input);

        estimated_tokens(&system) + estimated_tokens(&user)
    }
}

/// Values substituted into prompt templates.
#[derive(Debug, Clone, Default)]
pub struct PromptInput {
    values: BTreeMap<String, String>,
}

impl PromptInput {
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Substitute every `{key}` marker with its value.
    pub fn render(&self, template: &str) -> String {
        let mut rendered = template.to_string();

        for (key, value) in &self.values {
            rendered = rendered.replace(&format!("{{{key}}}"), value);
        }

        rendered
    }
}

/// Check if the input is too long and omit features if necessary.
///
/// Features from `omittable` are replaced with "omitted" in priority order
/// until the rendered prompt fits into `max_input_tokens`. Returns whether
/// the model should run; omitted feature names are emitted to `meta` in
/// debug mode.
pub fn check_length_and_omit(prompt: &ChatPrompt<'_>, input: &mut PromptInput, max_input_tokens: usize, omittable: &[&str], debug_mode: bool, meta: &MetaSink) -> bool {
    if prompt.estimated_tokens(input) <= max_input_tokens {
        return true;
    }

    let mut omitted = Vec::new();

    for feature in omittable {
        if !input.contains(feature) {
            continue;
        }

        omitted.push(*feature);
        input.set(feature, "omitted");
        debug!("Prompt over budget, omitting `{feature}`.");

        if prompt.estimated_tokens(input) <= max_input_tokens {
            if debug_mode {
                meta.emit("omitted_features", json!(omitted));
            }

            return true;
        }
    }

    false
}

/// Render the exercise's grading instructions for a prompt: the free-text
/// instructions followed by any structured criteria.
pub fn format_grading_instructions(exercise: &Exercise) -> String {
    let mut rendered = String::new();

    if let Some(instructions) = &exercise.grading_instructions
        && !instructions.is_empty()
    {
        rendered.push_str(instructions);
        rendered.push('\n');
    }

    for criterion in &exercise.grading_criteria {
        rendered.push_str(&render_criterion(criterion));
    }

    if rendered.is_empty() {
        return "No grading instructions.".to_string();
    }

    rendered
}

/// Render one criterion with its structured instructions.
pub fn render_criterion(criterion: &GradingCriterion) -> String {
    let mut rendered = format!("Criterion: {}\n", criterion.title.as_deref().unwrap_or("(untitled)"));

    for instruction in &criterion.structured_grading_instructions {
        rendered.push_str(&format!(
            "- [instruction {}] {} credits ({}): {} Feedback when applied: \"{}\". Usable {} time(s).\n",
            instruction.id,
            instruction.credits,
            instruction.grading_scale,
            instruction.instruction_description,
            instruction.feedback,
            if instruction.usage_count == 0 { "unlimited".to_string() } else { instruction.usage_count.to_string() },
        ));
    }

    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_all_markers() {
        let input = PromptInput::default().with("submission", "1: Hello").with("max_points", "10");

        let rendered = input.render("Grade ({max_points} points):\n{submission}");

        assert_eq!(rendered, "Grade (10 points):\n1: Hello");
    }

    #[test]
    fn fitting_prompt_omits_nothing() {
        let prompt = ChatPrompt { system: "{problem_statement}", user: "{submission}" };
        let mut input = PromptInput::default().with("problem_statement", "short").with("submission", "short");

        let meta = MetaSink::default();
        assert!(check_length_and_omit(&prompt, &mut input, 1000, OMITTABLE_FEATURES, true, &meta));
        assert_eq!(input.render("{problem_statement}"), "short");
        assert!(meta.snapshot().is_empty());
    }

    #[test]
    fn omits_least_important_features_first() {
        let prompt = ChatPrompt {
            system: "{problem_statement} {example_solution} {grading_instructions}",
            user: "{submission}",
        };
        let mut input = PromptInput::default()
            .with("problem_statement", "p".repeat(40))
            .with("example_solution", "e".repeat(4000))
            .with("grading_instructions", "g".repeat(40))
            .with("submission", "s".repeat(40));

        let meta = MetaSink::default();
        // Dropping the example solution alone is enough.
        assert!(check_length_and_omit(&prompt, &mut input, 100, OMITTABLE_FEATURES, true, &meta));

        assert_eq!(input.render("{example_solution}"), "omitted");
        assert_eq!(input.render("{problem_statement}"), "p".repeat(40));
        assert_eq!(meta.snapshot()["omitted_features"], serde_json::json!(["example_solution"]));
    }

    #[test]
    fn refuses_when_nothing_left_to_omit() {
        let prompt = ChatPrompt { system: "{problem_statement}", user: "{submission}" };
        let mut input = PromptInput::default().with("problem_statement", "p".repeat(40)).with("submission", "s".repeat(4000));

        let meta = MetaSink::default();
        assert!(!check_length_and_omit(&prompt, &mut input, 100, OMITTABLE_FEATURES, false, &meta));
    }

    #[test]
    fn grading_instructions_fall_back_to_placeholder() {
        let exercise = Exercise {
            id: 1,
            title: String::new(),
            max_points: 10.0,
            bonus_points: 0.0,
            problem_statement: None,
            example_solution: None,
            grading_instructions: None,
            grading_criteria: Vec::new(),
            meta: serde_json::Map::new(),
        };

        assert_eq!(format_grading_instructions(&exercise), "No grading instructions.");
    }
}
