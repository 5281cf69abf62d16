//! SurrealDB implementation of the module storage.
//!
//! Uses the `any` engine so the same client covers the in-memory database
//! (tests, local development) and a remote endpoint (deployment).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use surrealdb::{
    RecordId, Surreal,
    engine::any::{self, Any},
    opt::auth::Root,
};
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    types::{Exercise, Feedback, Res, StructuredGradingCriterion, Submission, Void},
};

use super::{DbClient, GenericDbClient};

// Extra methods on `DbClient` applied by the surreal implementation.

impl DbClient {
    /// Creates a new SurrealDB client from the configuration.
    ///
    /// Remote (non-`mem://`) endpoints sign in with the configured root
    /// credentials.
    pub async fn surreal(config: &Config) -> Res<Self> {
        let client = SurrealDbClient::connect(&config.db_endpoint, config.db_username.as_deref(), config.db_password.as_deref()).await?;

        Ok(Self::new(Arc::new(client)))
    }

    /// Creates an in-memory SurrealDB client.
    pub async fn surreal_memory() -> Res<Self> {
        let client = SurrealDbClient::connect("mem://", None, None).await?;

        Ok(Self::new(Arc::new(client)))
    }
}

// Records.

/// A stored submission, keyed by the platform submission id.
#[derive(Debug, Serialize, Deserialize)]
struct SubmissionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<RecordId>,
    exercise_id: i64,
    submission: Submission,
    stored_at: chrono::DateTime<chrono::Utc>,
}

/// Tutor feedback as received from the platform.
#[derive(Debug, Serialize, Deserialize)]
struct FeedbackRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<RecordId>,
    exercise_id: i64,
    submission_id: i64,
    feedback: Feedback,
    received_at: chrono::DateTime<chrono::Utc>,
}

/// A feedback suggestion produced by the module.
#[derive(Debug, Serialize, Deserialize)]
struct SuggestionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<RecordId>,
    exercise_id: i64,
    submission_id: i64,
    suggestion: Feedback,
    created_at: chrono::DateTime<chrono::Utc>,
}

/// The cached structured grading criteria, keyed by exercise id.
///
/// Only one entry exists per exercise; storing under the same key overwrites
/// the previous instruction set.
#[derive(Debug, Serialize, Deserialize)]
struct CriteriaCacheRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<RecordId>,
    instructions_hash: String,
    criteria: StructuredGradingCriterion,
    cached_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: usize,
}

// Specific implementations.

/// SurrealDB client implementation.
pub struct SurrealDbClient {
    db: Surreal<Any>,
}

impl SurrealDbClient {
    /// Connect to the endpoint and select the module namespace.
    #[instrument(name = "SurrealDbClient::connect", skip(username, password))]
    pub async fn connect(endpoint: &str, username: Option<&str>, password: Option<&str>) -> Res<Self> {
        let db = any::connect(endpoint).await?;

        if !endpoint.starts_with("mem:")
            && let (Some(username), Some(password)) = (username, password)
        {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns("assess").use_db("module").await?;

        info!("Database initialized successfully.");

        Ok(Self { db })
    }
}

#[async_trait]
impl GenericDbClient for SurrealDbClient {
    #[instrument(skip_all, fields(exercise_id = exercise.id, count = submissions.len()))]
    async fn store_submissions(&self, exercise: &Exercise, submissions: &[Submission]) -> Void {
        for submission in submissions {
            let mut submission = submission.clone();

            // Keep previously stored meta entries the incoming submission does not overwrite.
            let existing: Option<SubmissionRecord> = self.db.select(("submission", submission.id)).await?;
            if let Some(existing) = existing {
                let mut merged = existing.submission.meta;
                merged.extend(submission.meta);
                submission.meta = merged;
            }

            let record = SubmissionRecord {
                id: None,
                exercise_id: exercise.id,
                submission: submission.clone(),
                stored_at: chrono::Utc::now(),
            };

            let _: Option<SubmissionRecord> = self.db.upsert(("submission", submission.id)).content(record).await?;
        }

        Ok(())
    }

    #[instrument(skip_all, fields(exercise_id))]
    async fn get_submissions(&self, exercise_id: i64, submission_ids: &[i64]) -> Res<Vec<Submission>> {
        let mut submissions = Vec::new();

        for &submission_id in submission_ids {
            let record: Option<SubmissionRecord> = self.db.select(("submission", submission_id)).await?;

            if let Some(record) = record
                && record.exercise_id == exercise_id
            {
                submissions.push(record.submission);
            }
        }

        Ok(submissions)
    }

    #[instrument(skip_all, fields(exercise_id = feedback.exercise_id, submission_id = feedback.submission_id))]
    async fn store_feedback(&self, feedback: &Feedback) -> Void {
        let record = FeedbackRecord {
            id: None,
            exercise_id: feedback.exercise_id,
            submission_id: feedback.submission_id,
            feedback: feedback.clone(),
            received_at: chrono::Utc::now(),
        };

        let _: Option<FeedbackRecord> = self.db.create("feedback").content(record).await?;

        Ok(())
    }

    #[instrument(skip_all, fields(count = suggestions.len()))]
    async fn store_suggestions(&self, suggestions: &[Feedback]) -> Void {
        for suggestion in suggestions {
            let record = SuggestionRecord {
                id: None,
                exercise_id: suggestion.exercise_id,
                submission_id: suggestion.submission_id,
                suggestion: suggestion.clone(),
                created_at: chrono::Utc::now(),
            };

            let _: Option<SuggestionRecord> = self.db.create("suggestion").content(record).await?;
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn count_suggestions(&self, exercise_id: i64, submission_id: i64) -> Res<usize> {
        let mut response = self
            .db
            .query("SELECT count() AS count FROM suggestion WHERE exercise_id = $exercise_id AND submission_id = $submission_id GROUP ALL")
            .bind(("exercise_id", exercise_id))
            .bind(("submission_id", submission_id))
            .await?;

        let row: Option<CountRow> = response.take(0)?;

        Ok(row.map(|row| row.count).unwrap_or(0))
    }

    #[instrument(skip(self, instructions_hash))]
    async fn get_cached_criteria(&self, exercise_id: i64, instructions_hash: &str) -> Res<Option<StructuredGradingCriterion>> {
        let record: Option<CriteriaCacheRecord> = self.db.select(("criteria_cache", exercise_id)).await?;

        Ok(record.filter(|record| record.instructions_hash == instructions_hash).map(|record| record.criteria))
    }

    #[instrument(skip(self, instructions_hash, criteria))]
    async fn cache_criteria(&self, exercise_id: i64, instructions_hash: &str, criteria: &StructuredGradingCriterion) -> Void {
        let record = CriteriaCacheRecord {
            id: None,
            instructions_hash: instructions_hash.to_string(),
            criteria: criteria.clone(),
            cached_at: chrono::Utc::now(),
        };

        let _: Option<CriteriaCacheRecord> = self.db.upsert(("criteria_cache", exercise_id)).content(record).await?;

        Ok(())
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission(id: i64, exercise_id: i64, text: &str) -> Submission {
        Submission {
            id,
            exercise_id,
            text: text.to_string(),
            language: None,
            meta: serde_json::Map::new(),
        }
    }

    fn exercise(id: i64) -> Exercise {
        Exercise {
            id,
            title: "Essay".to_string(),
            max_points: 10.0,
            bonus_points: 0.0,
            problem_statement: None,
            example_solution: None,
            grading_instructions: None,
            grading_criteria: Vec::new(),
            meta: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn stores_and_retrieves_submissions_scoped_by_exercise() {
        let db = DbClient::surreal_memory().await.unwrap();

        db.store_submissions(&exercise(1), &[submission(10, 1, "a"), submission(11, 1, "b")]).await.unwrap();

        let found = db.get_submissions(1, &[10, 11, 12]).await.unwrap();
        assert_eq!(found.len(), 2);

        // Wrong exercise id yields nothing.
        let found = db.get_submissions(2, &[10, 11]).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn restoring_a_submission_merges_meta() {
        let db = DbClient::surreal_memory().await.unwrap();

        let mut first = submission(10, 1, "a");
        first.meta.insert("kept".to_string(), json!(true));
        first.meta.insert("overwritten".to_string(), json!("old"));
        db.store_submissions(&exercise(1), &[first]).await.unwrap();

        let mut second = submission(10, 1, "a");
        second.meta.insert("overwritten".to_string(), json!("new"));
        db.store_submissions(&exercise(1), &[second]).await.unwrap();

        let found = db.get_submissions(1, &[10]).await.unwrap();
        assert_eq!(found[0].meta["kept"], json!(true));
        assert_eq!(found[0].meta["overwritten"], json!("new"));
    }

    #[tokio::test]
    async fn counts_suggestions_per_submission() {
        let db = DbClient::surreal_memory().await.unwrap();

        let suggestion = Feedback {
            id: None,
            exercise_id: 1,
            submission_id: 10,
            title: "t".to_string(),
            description: "d".to_string(),
            index_start: None,
            index_end: None,
            credits: 1.0,
            structured_grading_instruction_id: None,
            is_graded: Some(true),
            meta: serde_json::Map::new(),
        };

        db.store_suggestions(&[suggestion.clone(), suggestion]).await.unwrap();

        assert_eq!(db.count_suggestions(1, 10).await.unwrap(), 2);
        assert_eq!(db.count_suggestions(1, 11).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn criteria_cache_is_keyed_by_hash() {
        let db = DbClient::surreal_memory().await.unwrap();

        let criteria = StructuredGradingCriterion { criteria: Vec::new() };

        db.cache_criteria(1, "hash-a", &criteria).await.unwrap();

        assert!(db.get_cached_criteria(1, "hash-a").await.unwrap().is_some());
        assert!(db.get_cached_criteria(1, "hash-b").await.unwrap().is_none());

        // A new hash overwrites the single per-exercise entry.
        db.cache_criteria(1, "hash-b", &criteria).await.unwrap();
        assert!(db.get_cached_criteria(1, "hash-a").await.unwrap().is_none());
        assert!(db.get_cached_criteria(1, "hash-b").await.unwrap().is_some());
    }
}
