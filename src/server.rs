//! HTTP router and the authentication middleware guarding it.

use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tracing::warn;

use crate::{grading::Configuration, interaction, runtime::Runtime};

/// Header carrying the shared secret for authenticated routes.
pub const API_SECRET_HEADER: &str = "x-api-secret";

/// Build the module's router. Health and config-schema routes are open; all
/// assessment routes require the API secret.
pub fn router(runtime: Runtime) -> Router {
    let authed = Router::new()
        .route("/submissions", post(interaction::submissions::handle))
        .route("/select_submission", post(interaction::select_submission::handle))
        .route("/feedback", post(interaction::feedback::handle))
        .route("/feedback_suggestions", post(interaction::feedback_suggestions::handle))
        .layer(middleware::from_fn_with_state(runtime.clone(), require_api_secret));

    Router::new().route("/", get(health)).route("/config_schema", get(config_schema)).merge(authed).with_state(runtime)
}

/// Liveness probe with basic module identification.
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "module": env!("CARGO_PKG_NAME"),
        "type": "text",
        "healthy": true,
    }))
}

/// JSON schema of the per-request module configuration.
async fn config_schema() -> Json<serde_json::Value> {
    let schema = schemars::schema_for!(Configuration);

    Json(serde_json::to_value(schema).unwrap_or_else(|_| json!({})))
}

async fn require_api_secret(State(runtime): State<Runtime>, request: Request, next: Next) -> Response {
    let provided = request.headers().get(API_SECRET_HEADER).and_then(|value| value.to_str().ok());

    if provided != Some(runtime.config.secret.as_str()) {
        warn!("Rejected request to {} with a missing or invalid API secret.", request.uri().path());

        return (StatusCode::FORBIDDEN, Json(json!({ "detail": "Invalid API secret." }))).into_response();
    }

    next.run(request).await
}
