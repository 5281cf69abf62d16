//! Request handlers for the assessment module's HTTP surface, plus the
//! envelope and error types they share.

pub mod feedback;
pub mod feedback_suggestions;
pub mod select_submission;
pub mod submissions;

use axum::{
    Json,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::{
    base::{
        config::Config,
        types::{Err, Res},
    },
    grading::Configuration,
};

/// Header carrying a per-request JSON override of the module configuration.
pub const MODULE_CONFIG_HEADER: &str = "x-module-config";

/// The response envelope every endpoint returns: the payload plus any
/// metadata accumulated while processing the request.
#[derive(Debug, Serialize)]
pub struct ModuleResponse<T: Serialize> {
    pub data: T,
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl<T: Serialize> ModuleResponse<T> {
    pub fn new(data: T, meta: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { data, meta }
    }

    /// An envelope with no metadata.
    pub fn plain(data: T) -> Self {
        Self::new(data, serde_json::Map::new())
    }
}

impl<T: Serialize> IntoResponse for ModuleResponse<T> {
    fn into_response(self) -> Response {
        Json(json!({ "data": self.data, "meta": self.meta })).into_response()
    }
}

/// Resolve the effective module configuration for a request: the
/// `X-Module-Config` header when present, otherwise defaults with the
/// globally configured debug flag.
pub fn module_config_from_headers(headers: &HeaderMap, config: &Config) -> Res<Configuration> {
    let Some(value) = headers.get(MODULE_CONFIG_HEADER) else {
        return Ok(Configuration {
            debug: config.debug,
            ..Configuration::default()
        });
    };

    let raw = value.to_str().map_err(|_| anyhow::anyhow!("Module config header is not valid UTF-8."))?;
    let configuration: Configuration = serde_json::from_str(raw).map_err(|err| anyhow::anyhow!("Could not parse module config: {err}"))?;

    Ok(configuration)
}

/// An error surfaced to the caller as `{"detail": ...}` with a status code.
/// Anything not explicitly classified becomes a 500.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub err: Err,
}

impl ApiError {
    pub fn bad_request(err: impl Into<Err>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            err: err.into(),
        }
    }
}

impl From<Err> for ApiError {
    fn from(err: Err) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            err,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed: {:#}", self.err);
        }

        (self.status, Json(json!({ "detail": self.err.to_string() }))).into_response()
    }
}
