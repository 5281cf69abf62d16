//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;

use super::types::Res;

/// Default bind host.
fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// Default bind port.
fn default_port() -> u16 {
    5001
}

/// Default Azure OpenAI API version.
fn default_azure_openai_api_version() -> String {
    "2024-06-01".to_string()
}

/// Default base model to use.
fn default_base_model() -> String {
    "gpt-4o".to_string()
}

/// Default sampling temperature.
fn default_temperature() -> f32 {
    0.0
}

/// Default reasoning effort for reasoning models.
fn default_reasoning_effort() -> String {
    "medium".to_string()
}

/// Default max output tokens per completion.
fn default_max_tokens() -> u32 {
    4096
}

/// Default database endpoint (in-memory).
fn default_db_endpoint() -> String {
    "mem://".to_string()
}

/// Configuration for the assessment module.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Shared secret expected in the `X-API-Secret` header of every
    /// authenticated request (`SECRET`).
    pub secret: String,
    /// Bind host (`HOST`).
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port (`PORT`).
    #[serde(default = "default_port")]
    pub port: u16,
    /// OpenAI API key (`OPENAI_API_KEY`).
    #[serde(default)]
    pub openai_api_key: Option<String>,
    /// Azure OpenAI API key (`AZURE_OPENAI_API_KEY`).
    #[serde(default)]
    pub azure_openai_api_key: Option<String>,
    /// Azure OpenAI endpoint (`AZURE_OPENAI_ENDPOINT`).
    #[serde(default)]
    pub azure_openai_endpoint: Option<String>,
    /// Azure OpenAI API version (`AZURE_OPENAI_API_VERSION`).
    #[serde(default = "default_azure_openai_api_version")]
    pub azure_openai_api_version: String,
    /// Azure OpenAI deployment id (`AZURE_OPENAI_DEPLOYMENT`).
    #[serde(default)]
    pub azure_openai_deployment: Option<String>,
    /// Model used by default for all approaches (`BASE_MODEL`).
    #[serde(default = "default_base_model")]
    pub base_model: String,
    /// Cheaper model for low-stakes calls (`MINI_MODEL`); falls back to the
    /// base model when unset.
    #[serde(default)]
    pub mini_model: Option<String>,
    /// Reasoning model for short chains (`FAST_REASONING_MODEL`); falls back
    /// to the base model when unset.
    #[serde(default)]
    pub fast_reasoning_model: Option<String>,
    /// Reasoning model for long chains (`LONG_REASONING_MODEL`); falls back
    /// to the base model when unset.
    #[serde(default)]
    pub long_reasoning_model: Option<String>,
    /// Sampling temperature (`TEMPERATURE`). Value between 0 and 2; only
    /// applied to models that support sampling parameters.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Reasoning effort for `o*` models (`REASONING_EFFORT`): low, medium,
    /// or high.
    #[serde(default = "default_reasoning_effort")]
    pub reasoning_effort: String,
    /// Max output tokens per completion (`MAX_TOKENS`).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Database endpoint (`DB_ENDPOINT`), `mem://` for in-memory.
    #[serde(default = "default_db_endpoint")]
    pub db_endpoint: String,
    /// Database username (`DB_USERNAME`), required for remote endpoints.
    #[serde(default)]
    pub db_username: Option<String>,
    /// Database password (`DB_PASSWORD`), required for remote endpoints.
    #[serde(default)]
    pub db_password: Option<String>,
    /// Default debug flag (`DEBUG`); per-request module config can override.
    #[serde(default)]
    pub debug: bool,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            secret: String::new(),
            host: default_host(),
            port: default_port(),
            openai_api_key: None,
            azure_openai_api_key: None,
            azure_openai_endpoint: None,
            azure_openai_api_version: default_azure_openai_api_version(),
            azure_openai_deployment: None,
            base_model: default_base_model(),
            mini_model: None,
            fast_reasoning_model: None,
            long_reasoning_model: None,
            temperature: default_temperature(),
            reasoning_effort: default_reasoning_effort(),
            max_tokens: default_max_tokens(),
            db_endpoint: default_db_endpoint(),
            db_username: None,
            db_password: None,
            debug: false,
        }
    }
}

/// Model roles an approach can select; absent roles fall back to the base
/// model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    Base,
    Mini,
    FastReasoning,
    LongReasoning,
}

impl ConfigInner {
    /// Resolve a model role to the configured model name.
    pub fn resolve_model(&self, role: ModelRole) -> &str {
        let configured = match role {
            ModelRole::Base => None,
            ModelRole::Mini => self.mini_model.as_deref(),
            ModelRole::FastReasoning => self.fast_reasoning_model.as_deref(),
            ModelRole::LongReasoning => self.long_reasoning_model.as_deref(),
        };

        configured.unwrap_or(&self.base_model)
    }
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default().prefix("ASSESS_MODULE"));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        if result.secret.is_empty() {
            return Err(anyhow::anyhow!("API secret must not be empty."));
        }

        if result.temperature < 0.0 || result.temperature > 2.0 {
            return Err(anyhow::anyhow!("Temperature must be between 0 and 2."));
        }

        if result.max_tokens < 1 || result.max_tokens > 128000 {
            return Err(anyhow::anyhow!("Max tokens must be between 1 and 128000."));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_roles_fall_back_to_base_model() {
        let config = ConfigInner {
            base_model: "gpt-4o".to_string(),
            mini_model: Some("gpt-4o-mini".to_string()),
            ..Default::default()
        };

        assert_eq!(config.resolve_model(ModelRole::Base), "gpt-4o");
        assert_eq!(config.resolve_model(ModelRole::Mini), "gpt-4o-mini");
        assert_eq!(config.resolve_model(ModelRole::FastReasoning), "gpt-4o");
        assert_eq!(config.resolve_model(ModelRole::LongReasoning), "gpt-4o");
    }

    #[test]
    fn model_role_deserializes_from_snake_case() {
        let role: ModelRole = serde_json::from_str("\"fast_reasoning\"").unwrap();
        assert_eq!(role, ModelRole::FastReasoning);
    }
}
