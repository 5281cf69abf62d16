//! OpenAI-compatible LLM client implementation.
//!
//! One implementation covers both OpenAI and Azure OpenAI: the client is
//! generic over `async_openai`'s provider config, so the retry loop and the
//! model capability gating are shared.

use std::sync::Arc;
use std::time::Duration;

use async_openai::{
    Client,
    config::{AzureConfig, Config as ProviderConfig, OpenAIConfig},
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
        ReasoningEffort, ResponseFormat, ResponseFormatJsonSchema,
    },
};
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::base::{config::Config, types::Res};

use super::{CompletionRequest, GenericLlmClient, LlmClient, ResponseSchema};

// Extra methods on `LlmClient` applied by the provider implementations.

impl LlmClient {
    /// Create an OpenAI-backed client.
    pub fn openai(config: &Config) -> Res<Self> {
        let api_key = config.openai_api_key.as_deref().ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is not set."))?;
        let provider = OpenAIConfig::new().with_api_key(api_key);

        Ok(Self::new(Arc::new(OpenAiLlmClient::new(provider, config))))
    }

    /// Create an Azure-OpenAI-backed client.
    pub fn azure(config: &Config) -> Res<Self> {
        let api_key = config.azure_openai_api_key.as_deref().ok_or_else(|| anyhow::anyhow!("AZURE_OPENAI_API_KEY is not set."))?;
        let endpoint = config.azure_openai_endpoint.as_deref().ok_or_else(|| anyhow::anyhow!("AZURE_OPENAI_ENDPOINT is not set."))?;
        let deployment = config.azure_openai_deployment.as_deref().ok_or_else(|| anyhow::anyhow!("AZURE_OPENAI_DEPLOYMENT is not set."))?;

        let provider = AzureConfig::new()
            .with_api_base(endpoint)
            .with_api_key(api_key)
            .with_api_version(&config.azure_openai_api_version)
            .with_deployment_id(deployment);

        Ok(Self::new(Arc::new(OpenAiLlmClient::new(provider, config))))
    }
}

// Specific implementations.

/// LLM client for any OpenAI-compatible provider.
pub struct OpenAiLlmClient<C>
where
    C: ProviderConfig + Send + Sync + 'static,
{
    client: Client<C>,
    config: Config,
}

impl<C> OpenAiLlmClient<C>
where
    C: ProviderConfig + Send + Sync + 'static,
{
    /// Create a new client from a provider config.
    #[instrument(name = "OpenAiLlmClient::new", skip_all)]
    pub fn new(provider: C, config: &Config) -> Self {
        Self {
            client: Client::with_config(provider),
            config: config.clone(),
        }
    }

    /// Build the chat messages for the request.
    ///
    /// Models without system-message support get the system content folded
    /// into the user message instead.
    fn build_messages(&self, request: &CompletionRequest) -> Res<Vec<ChatCompletionRequestMessage>> {
        if !supports_system_messages(&request.model) {
            let combined = format!("[System message]: {}\n\n{}", request.system, request.user);

            return Ok(vec![ChatCompletionRequestUserMessageArgs::default().content(combined).build()?.into()]);
        }

        Ok(vec![
            ChatCompletionRequestSystemMessageArgs::default().content(request.system.clone()).build()?.into(),
            ChatCompletionRequestUserMessageArgs::default().content(request.user.clone()).build()?.into(),
        ])
    }

    /// Helper function to make API calls with retry logic and timeout handling.
    async fn call_api(&self, request_builder: CreateChatCompletionRequestArgs) -> Res<CreateChatCompletionResponse> {
        const MAX_RETRIES: u32 = 3;
        const TIMEOUT: u64 = 120; // Providers can be slow, especially with reasoning models
        const RETRY_DELAY_MS: u64 = 1000;

        let mut retries = 0;

        loop {
            let request = request_builder.build()?;
            let result = timeout(Duration::from_secs(TIMEOUT), self.client.chat().create(request)).await;

            match result {
                Ok(Ok(response)) => {
                    info!("LLM API call succeeded after {} attempts", retries + 1);
                    return Ok(response);
                }
                Ok(Err(err)) => {
                    if retries >= MAX_RETRIES {
                        return Err(anyhow::anyhow!("LLM API call failed after {MAX_RETRIES} retries: {err}"));
                    }
                    retries += 1;
                    warn!("LLM API call failed, retrying {retries}/{MAX_RETRIES}: {err}");

                    let delay = Duration::from_millis(RETRY_DELAY_MS * 2_u64.pow(retries - 1));
                    tokio::time::sleep(delay).await;
                }
                Err(_) => {
                    if retries >= MAX_RETRIES {
                        return Err(anyhow::anyhow!("LLM API call timed out after {MAX_RETRIES} attempts"));
                    }
                    retries += 1;
                    warn!("LLM API call timed out, retrying {retries}/{MAX_RETRIES}");

                    let delay = Duration::from_millis(RETRY_DELAY_MS * 2_u64.pow(retries - 1));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl<C> GenericLlmClient for OpenAiLlmClient<C>
where
    C: ProviderConfig + Send + Sync + 'static,
{
    #[instrument(name = "OpenAiLlmClient::complete_structured", skip_all, fields(model = %request.model))]
    async fn complete_structured(&self, request: &CompletionRequest, format: &ResponseSchema) -> Res<String> {
        let messages = self.build_messages(request)?;

        let response_format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                name: format.name.clone(),
                description: Some(format.description.clone()),
                schema: Some(format.schema.clone()),
                strict: Some(true),
            },
        };

        // Create the request.
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&request.model)
            .messages(messages)
            .max_completion_tokens(self.config.max_tokens)
            .response_format(response_format);

        // Add the temperature for the non-reasoning models.
        if request.model.starts_with("gpt") {
            builder.temperature(self.config.temperature);
        }

        // Add the reasoning effort for `o` models.
        if request.model.starts_with('o') {
            builder.reasoning_effort(parse_reasoning_effort(&self.config.reasoning_effort)?);
        }

        let response = self.call_api(builder).await?;

        let choice = response.choices.into_iter().next().ok_or_else(|| anyhow::anyhow!("Model returned no choices."))?;

        if let Some(refusal) = choice.message.refusal {
            return Err(anyhow::anyhow!("Request refused: {refusal}"));
        }

        choice.message.content.ok_or_else(|| anyhow::anyhow!("Model returned no content."))
    }
}

/// Whether a model accepts a separate system message.
fn supports_system_messages(model: &str) -> bool {
    !model.starts_with("o1-mini")
}

/// Convert a string reasoning effort to the `ReasoningEffort` enum.
fn parse_reasoning_effort(effort: &str) -> Res<ReasoningEffort> {
    match effort.to_lowercase().as_str() {
        "low" => Ok(ReasoningEffort::Low),
        "medium" => Ok(ReasoningEffort::Medium),
        "high" => Ok(ReasoningEffort::High),
        _ => Err(anyhow::anyhow!("Invalid reasoning effort: {effort}. Must be one of: low, medium, high")),
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::base::config::ConfigInner;

    fn create_test_config() -> Config {
        Config {
            inner: Arc::new(ConfigInner {
                openai_api_key: Some("test_key".to_string()),
                base_model: "gpt-4o-mini".to_string(),
                max_tokens: 200u32, // Small for tests
                ..Default::default()
            }),
        }
    }

    #[test]
    fn system_messages_fold_into_user_for_unsupported_models() {
        let config = create_test_config();
        let client = OpenAiLlmClient::new(OpenAIConfig::new(), &config);

        let request = CompletionRequest {
            system: "Grade strictly.".to_string(),
            user: "1: The answer.".to_string(),
            model: "o1-mini".to_string(),
        };

        let messages = client.build_messages(&request).unwrap();

        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn system_messages_kept_for_supported_models() {
        let config = create_test_config();
        let client = OpenAiLlmClient::new(OpenAIConfig::new(), &config);

        let request = CompletionRequest {
            system: "Grade strictly.".to_string(),
            user: "1: The answer.".to_string(),
            model: "gpt-4o".to_string(),
        };

        let messages = client.build_messages(&request).unwrap();

        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
    }

    #[test]
    fn reasoning_effort_parses_case_insensitively() {
        assert!(matches!(parse_reasoning_effort("High").unwrap(), ReasoningEffort::High));
        assert!(parse_reasoning_effort("extreme").is_err());
    }

    #[test]
    fn provider_selection_prefers_azure() {
        let config = Config {
            inner: Arc::new(ConfigInner {
                openai_api_key: Some("openai_key".to_string()),
                azure_openai_api_key: Some("azure_key".to_string()),
                azure_openai_endpoint: Some("https://example.openai.azure.com".to_string()),
                azure_openai_deployment: Some("gpt-4o".to_string()),
                ..Default::default()
            }),
        };

        assert!(LlmClient::from_config(&config).is_ok());
    }

    #[test]
    fn provider_selection_requires_some_credentials() {
        let config = Config {
            inner: Arc::new(ConfigInner::default()),
        };

        assert!(LlmClient::from_config(&config).is_err());
    }

    #[test]
    fn azure_requires_deployment() {
        let config = Config {
            inner: Arc::new(ConfigInner {
                azure_openai_api_key: Some("azure_key".to_string()),
                azure_openai_endpoint: Some("https://example.openai.azure.com".to_string()),
                ..Default::default()
            }),
        };

        assert!(LlmClient::azure(&config).is_err());
    }
}
