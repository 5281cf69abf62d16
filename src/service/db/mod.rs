pub mod surreal;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{Exercise, Feedback, Res, StructuredGradingCriterion, Submission, Void};

// Traits.

/// Generic database client trait that clients must implement.
///
/// This trait defines the storage the module surface needs: submissions for
/// the selector, tutor feedback, produced suggestions, and the structured
/// grading-criteria cache. Implementing this trait allows different database
/// backends to be used with the module.
#[async_trait]
pub trait GenericDbClient: Send + Sync + 'static {
    /// Stores submissions for an exercise.
    ///
    /// A re-stored submission keeps previously stored `meta` entries that the
    /// incoming submission does not overwrite.
    async fn store_submissions(&self, exercise: &Exercise, submissions: &[Submission]) -> Void;

    /// Gets the stored submissions among the requested ids.
    ///
    /// Ids that were never sent to [`Self::store_submissions`] are silently
    /// absent from the result.
    async fn get_submissions(&self, exercise_id: i64, submission_ids: &[i64]) -> Res<Vec<Submission>>;

    /// Stores tutor feedback for later analysis.
    async fn store_feedback(&self, feedback: &Feedback) -> Void;

    /// Stores feedback suggestions produced by the module.
    async fn store_suggestions(&self, suggestions: &[Feedback]) -> Void;

    /// Counts the stored suggestions for a submission.
    ///
    /// This drives submission selection: submissions with fewer suggestions
    /// are assessed first.
    async fn count_suggestions(&self, exercise_id: i64, submission_id: i64) -> Res<usize>;

    /// Gets the cached structured grading criteria for an exercise, if the
    /// cached entry was derived from inputs with the given hash.
    async fn get_cached_criteria(&self, exercise_id: i64, instructions_hash: &str) -> Res<Option<StructuredGradingCriterion>>;

    /// Caches the structured grading criteria for an exercise.
    ///
    /// There is only one cached instruction set per exercise; a new hash
    /// overwrites the previous entry.
    async fn cache_criteria(&self, exercise_id: i64, instructions_hash: &str, criteria: &StructuredGradingCriterion) -> Void;
}

// Structs.

/// Database client for the assessment module.
///
/// This is trivially cloneable and can be passed around without the need for
/// `Arc` or `Mutex`.
#[derive(Clone)]
pub struct DbClient {
    inner: Arc<dyn GenericDbClient>,
}

impl Deref for DbClient {
    type Target = dyn GenericDbClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl DbClient {
    pub fn new(inner: Arc<dyn GenericDbClient>) -> Self {
        Self { inner }
    }
}
