#![cfg(test)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use assess_module::{
    base::{
        config::{Config, ConfigInner},
        types::Res,
    },
    runtime::Runtime,
    server,
    service::{
        db::DbClient,
        llm::{CompletionRequest, GenericLlmClient, LlmClient, ResponseSchema},
    },
};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use mockall::mock;
use serde_json::{Value, json};
use tower::ServiceExt;

// Mocks.

mock! {
    pub Llm {}

    #[async_trait]
    impl GenericLlmClient for Llm {
        async fn complete_structured(&self, request: &CompletionRequest, format: &ResponseSchema) -> Res<String>;
    }
}

/// An LLM mock that answers every structured call with a fixed assessment.
fn mock_llm_with_assessment(assessment: Value) -> MockLlm {
    let mut mock = MockLlm::new();

    mock.expect_complete_structured().returning(move |_, _| Ok(assessment.to_string()));

    mock
}

/// Helper function to set up the test environment with an in-memory database
/// and the given LLM mock.
async fn setup_test_environment(llm: MockLlm) -> Router {
    let config = Config {
        inner: Arc::new(ConfigInner {
            secret: "top-secret".to_string(),
            ..Default::default()
        }),
    };

    let runtime = Runtime {
        config,
        db: DbClient::surreal_memory().await.unwrap(),
        llm: LlmClient::new(Arc::new(llm)),
    };

    server::router(runtime)
}

fn authed_post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .header("x-api-secret", "top-secret")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();

    serde_json::from_slice(&bytes).unwrap()
}

fn exercise() -> Value {
    json!({
        "id": 1,
        "title": "Essay",
        "max_points": 10.0,
        "bonus_points": 0.0,
        "problem_statement": "Explain polymorphism.",
        "grading_instructions": "2 points per correct concept."
    })
}

fn submission(id: i64) -> Value {
    json!({
        "id": id,
        "exercise_id": 1,
        "text": "Polymorphism lets one interface serve many types.\nIt comes in static and dynamic flavors."
    })
}

// Tests.

#[tokio::test]
async fn health_and_config_schema_are_open() {
    let app = setup_test_environment(MockLlm::new()).await;

    let response = app.clone().oneshot(Request::get("/").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["healthy"], json!(true));
    assert_eq!(body["type"], json!("text"));

    let response = app.oneshot(Request::get("/config_schema").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let schema = response_json(response).await;
    assert!(schema["properties"]["approach"].is_object());
}

#[tokio::test]
async fn assessment_routes_reject_a_missing_or_wrong_secret() {
    let app = setup_test_environment(MockLlm::new()).await;

    let missing = Request::post("/submissions")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "exercise": exercise(), "submissions": [] }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(missing).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response_json(response).await["detail"], json!("Invalid API secret."));

    let wrong = Request::post("/submissions")
        .header("content-type", "application/json")
        .header("x-api-secret", "nope")
        .body(Body::from(json!({ "exercise": exercise(), "submissions": [] }).to_string()))
        .unwrap();
    let response = app.oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn select_submission_returns_minus_one_without_stored_submissions() {
    let app = setup_test_environment(MockLlm::new()).await;

    let response = app
        .oneshot(authed_post("/select_submission", json!({ "exercise": exercise(), "submission_ids": [10, 11] })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["data"], json!(-1));
}

#[tokio::test]
async fn submissions_round_trip_through_selection() {
    let app = setup_test_environment(MockLlm::new()).await;

    let response = app
        .clone()
        .oneshot(authed_post("/submissions", json!({ "exercise": exercise(), "submissions": [submission(10), submission(11)] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Neither submission has suggestions yet; the lowest id wins.
    let response = app
        .oneshot(authed_post("/select_submission", json!({ "exercise": exercise(), "submission_ids": [10, 11] })))
        .await
        .unwrap();
    assert_eq!(response_json(response).await["data"], json!(10));
}

#[tokio::test]
async fn feedback_suggestions_map_lines_onto_the_submission() {
    let llm = mock_llm_with_assessment(json!({
        "feedbacks": [{
            "title": "Good definition",
            "description": "The first line captures the concept.",
            "line_start": 1,
            "line_end": 1,
            "credits": 2.0,
            "grading_instruction_id": null
        }]
    }));
    let app = setup_test_environment(llm).await;

    let response = app
        .oneshot(authed_post("/feedback_suggestions", json!({ "exercise": exercise(), "submission": submission(10) })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let suggestion = &body["data"][0];
    assert_eq!(suggestion["title"], json!("Good definition"));
    assert_eq!(suggestion["credits"], json!(2.0));
    assert_eq!(suggestion["index_start"], json!(0));
    assert_eq!(suggestion["index_end"], json!(49));
    assert_eq!(suggestion["is_graded"], json!(true));
}

#[tokio::test]
async fn malformed_module_config_is_a_bad_request() {
    let app = setup_test_environment(MockLlm::new()).await;

    let request = Request::post("/feedback_suggestions")
        .header("content-type", "application/json")
        .header("x-api-secret", "top-secret")
        .header("x-module-config", "{not json")
        .body(Body::from(json!({ "exercise": exercise(), "submission": submission(10) }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn divide_and_conquer_derives_criteria_once_per_instruction_hash() {
    let criteria_calls = Arc::new(AtomicUsize::new(0));
    let calls = criteria_calls.clone();

    let mut mock = MockLlm::new();
    mock.expect_complete_structured().returning(move |_, format| {
        if format.name == "StructuredGradingCriterion" {
            calls.fetch_add(1, Ordering::SeqCst);

            Ok(json!({
                "criteria": [{
                    "id": 1,
                    "title": "Content",
                    "structured_grading_instructions": [{
                        "id": 100,
                        "credits": 2.0,
                        "grading_scale": "Good",
                        "instruction_description": "Concept is explained.",
                        "feedback": "Well explained.",
                        "usage_count": 1
                    }]
                }]
            })
            .to_string())
        } else {
            Ok(json!({
                "feedbacks": [{
                    "title": "Content",
                    "description": "Covers the concept.",
                    "line_start": null,
                    "line_end": null,
                    "credits": 2.0,
                    "grading_instruction_id": 100
                }]
            })
            .to_string())
        }
    });

    let app = setup_test_environment(mock).await;
    let config_header = json!({ "approach": { "type": "divide_and_conquer" } }).to_string();

    for id in [10, 11] {
        let request = Request::post("/feedback_suggestions")
            .header("content-type", "application/json")
            .header("x-api-secret", "top-secret")
            .header("x-module-config", config_header.clone())
            .body(Body::from(json!({ "exercise": exercise(), "submission": submission(id) }).to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body["data"][0]["structured_grading_instruction_id"], json!(100));
    }

    // The second request must hit the criteria cache.
    assert_eq!(criteria_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn divide_and_conquer_skips_plagiarism_and_tolerates_a_failed_criterion() {
    let plagiarism_calls = Arc::new(AtomicUsize::new(0));
    let calls = plagiarism_calls.clone();

    let mut mock = MockLlm::new();
    mock.expect_complete_structured().returning(move |request, _| {
        if request.system.contains("Plagiarism") {
            calls.fetch_add(1, Ordering::SeqCst);
        }

        if request.system.contains("Structure") {
            return Err(anyhow::anyhow!("model unavailable"));
        }

        Ok(json!({
            "feedbacks": [{
                "title": "Content covered",
                "description": "The concept is explained.",
                "line_start": 1,
                "line_end": 1,
                "credits": 2.0,
                "grading_instruction_id": 100
            }]
        })
        .to_string())
    });

    let app = setup_test_environment(mock).await;

    // Platform-provided criteria, so no derivation call happens.
    let mut exercise = exercise();
    exercise["grading_criteria"] = json!([
        {
            "id": 1,
            "title": "Plagiarism",
            "structured_grading_instructions": []
        },
        {
            "id": 2,
            "title": "Content",
            "structured_grading_instructions": [{
                "id": 100,
                "credits": 2.0,
                "grading_scale": "Good",
                "instruction_description": "Concept is explained.",
                "feedback": "Well explained.",
                "usage_count": 1
            }]
        },
        {
            "id": 3,
            "title": "Structure",
            "structured_grading_instructions": []
        }
    ]);

    let request = Request::post("/feedback_suggestions")
        .header("content-type", "application/json")
        .header("x-api-secret", "top-secret")
        .header("x-module-config", json!({ "approach": { "type": "divide_and_conquer" } }).to_string())
        .body(Body::from(json!({ "exercise": exercise, "submission": submission(10) }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    // The failed criterion contributes nothing, but the request succeeds
    // with the surviving criterion's feedback.
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["title"], json!("Content covered"));
    assert_eq!(body["data"][0]["structured_grading_instruction_id"], json!(100));

    // The plagiarism criterion was never sent to the model.
    assert_eq!(plagiarism_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_derived_criteria_fail_the_request() {
    let mut mock = MockLlm::new();
    mock.expect_complete_structured().returning(|_, format| {
        assert_eq!(format.name, "StructuredGradingCriterion");

        Ok(json!({ "criteria": [] }).to_string())
    });

    let app = setup_test_environment(mock).await;

    let request = Request::post("/feedback_suggestions")
        .header("content-type", "application/json")
        .header("x-api-secret", "top-secret")
        .header("x-module-config", json!({ "approach": { "type": "divide_and_conquer" } }).to_string())
        .body(Body::from(json!({ "exercise": exercise(), "submission": submission(10) }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn tutor_feedback_is_accepted() {
    let app = setup_test_environment(MockLlm::new()).await;

    let response = app
        .oneshot(authed_post(
            "/feedback",
            json!({
                "exercise": exercise(),
                "submission": submission(10),
                "feedback": {
                    "exercise_id": 1,
                    "submission_id": 10,
                    "title": "Imprecise",
                    "description": "The second flavor is called dynamic dispatch.",
                    "credits": -1.0
                }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
