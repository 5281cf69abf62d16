pub mod openai;

use crate::base::{config::Config, types::Res};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::ops::Deref;
use tracing::info;

// Types.

/// A (system, user) prompt pair addressed to a specific model.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub model: String,
}

/// Strict JSON-schema response format for a structured completion.
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

// Traits.

/// Generic LLM client trait that clients must implement.
///
/// This trait defines the core functionality for interacting with large
/// language models: completing a prompt pair with strict structured output.
/// Implementing this trait allows different LLM providers to be used with
/// the module.
#[async_trait]
pub trait GenericLlmClient: Send + Sync + 'static {
    /// Complete the request with output constrained to the given JSON
    /// schema, returning the raw JSON text of the completion.
    async fn complete_structured(&self, request: &CompletionRequest, format: &ResponseSchema) -> Res<String>;
}

// Structs.

/// LLM client for the application.
///
/// This is trivially cloneable and can be passed around without the need for
/// `Arc` or `Mutex`.
#[derive(Clone)]
pub struct LlmClient {
    inner: Arc<dyn GenericLlmClient>,
}

impl Deref for LlmClient {
    type Target = dyn GenericLlmClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl LlmClient {
    pub fn new(inner: Arc<dyn GenericLlmClient>) -> Self {
        Self { inner }
    }

    /// Select a provider from the configuration.
    ///
    /// Azure OpenAI is preferred when both its key and endpoint are set;
    /// otherwise OpenAI is used when its key is present. Missing credentials
    /// for both providers is a configuration error.
    pub fn from_config(config: &Config) -> Res<Self> {
        if config.azure_openai_api_key.is_some() && config.azure_openai_endpoint.is_some() {
            info!("Using Azure OpenAI provider.");
            return Self::azure(config);
        }

        if config.openai_api_key.is_some() {
            info!("Azure OpenAI not configured, falling back to OpenAI provider.");
            return Self::openai(config);
        }

        Err(anyhow::anyhow!("No LLM provider configured: set OPENAI_API_KEY, or AZURE_OPENAI_API_KEY and AZURE_OPENAI_ENDPOINT."))
    }

    /// Complete the request and parse the completion into `T`.
    ///
    /// Deserialization failures are re-raised as generic errors so callers
    /// treat a malformed completion like any other model failure.
    pub async fn predict_and_parse<T: DeserializeOwned>(&self, request: &CompletionRequest, format: &ResponseSchema) -> Res<T> {
        let raw = self.complete_structured(request, format).await?;

        serde_json::from_str(&raw).map_err(|err| anyhow::anyhow!("Could not parse model output as `{}`: {err}", format.name))
    }
}
