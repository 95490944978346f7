pub mod openai;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::commands::settings::{ConfigError, ProviderKind, Settings};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OLLAMA_HOST: &str = "http://localhost:11434";
/// Ollama ignores the credential but the OpenAI wire format wants one.
pub const OLLAMA_PLACEHOLDER_KEY: &str = "ollama";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatResponse {
    pub answer: String,
    /// Some local servers leave this out.
    pub usage: Option<Usage>,
}

/// Model name and sampling parameters, fixed for the lifetime of a client.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Chat-completion backend: OpenAI itself or a local OpenAI-compatible Ollama server.
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAi(openai::OpenAiConfig),
    Ollama(openai::OpenAiConfig),
}

impl Provider {
    pub fn openai(api_key: String) -> Self {
        Provider::OpenAi(openai::OpenAiConfig {
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
        })
    }

    pub fn ollama(host: &str) -> Self {
        Provider::Ollama(openai::OpenAiConfig {
            api_key: OLLAMA_PLACEHOLDER_KEY.to_string(),
            base_url: format!("{}/v1", host.trim_end_matches('/')),
        })
    }

    /// Resolve the provider selected in `settings`, checking its credential.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        match settings.provider {
            ProviderKind::OpenAi => {
                let api_key = settings
                    .openai_api_key
                    .clone()
                    .filter(|k| !k.trim().is_empty())
                    .ok_or(ConfigError::MissingApiKey {
                        provider: ProviderKind::OpenAi,
                        key: "OPENAI_API_KEY",
                    })?;
                Ok(Provider::OpenAi(openai::OpenAiConfig {
                    api_key,
                    base_url: settings.openai_base_url.trim_end_matches('/').to_string(),
                }))
            }
            ProviderKind::Ollama => Ok(Provider::ollama(&settings.ollama_host)),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::OpenAi(_) => ProviderKind::OpenAi,
            Provider::Ollama(_) => ProviderKind::Ollama,
        }
    }

    pub fn config(&self) -> &openai::OpenAiConfig {
        match self {
            Provider::OpenAi(config) | Provider::Ollama(config) => config,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Anything that can answer a [`ChatRequest`].
#[allow(async_fn_in_trait)]
pub trait ChatCompletion {
    fn params(&self) -> &GenerationParams;

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;

    fn build_request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        let params = self.params();
        ChatRequest {
            model: params.model.clone(),
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        }
    }
}

/// Chat-completion client bound to one provider and one set of generation parameters.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    provider: Provider,
    params: GenerationParams,
    http: reqwest::Client,
}

impl CompletionClient {
    pub fn new(
        provider: Provider,
        params: GenerationParams,
        timeout: Option<std::time::Duration>,
    ) -> Result<Self, LlmError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        info!(
            provider = %provider.kind(),
            model = %params.model,
            base_url = %provider.config().base_url,
            "Initialized chat client"
        );
        Ok(Self {
            provider,
            params,
            http,
        })
    }

    /// Resolve provider and parameters from settings. Fails before any network use.
    pub fn from_settings(settings: &Settings) -> crate::Result<Self> {
        let provider = Provider::from_settings(settings)?;
        let params = GenerationParams {
            model: settings.model().to_string(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        };
        Ok(Self::new(provider, params, settings.request_timeout)?)
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }
}

impl ChatCompletion for CompletionClient {
    fn params(&self) -> &GenerationParams {
        &self.params
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let response = openai::chat(&self.http, self.provider.config(), request).await?;
        match &response.usage {
            Some(usage) => info!(
                total = usage.total_tokens,
                prompt = usage.prompt_tokens,
                completion = usage.completion_tokens,
                "Tokens used"
            ),
            None => info!("Provider did not report token usage"),
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::settings::Settings;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_openai_without_key_fails_construction() {
        let err = CompletionClient::from_settings(&settings(&[("LLM_PROVIDER", "openai")]))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Config(ConfigError::MissingApiKey {
                provider: ProviderKind::OpenAi,
                ..
            })
        ));
    }

    #[test]
    fn test_openai_blank_key_is_missing() {
        let err = Provider::from_settings(&settings(&[("OPENAI_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey { .. }));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let client = CompletionClient::from_settings(&settings(&[("LLM_PROVIDER", "ollama")]))
            .unwrap();
        assert_eq!(client.provider().kind(), ProviderKind::Ollama);
        assert_eq!(client.provider().config().base_url, "http://localhost:11434/v1");
        assert_eq!(client.provider().config().api_key, OLLAMA_PLACEHOLDER_KEY);
        assert_eq!(client.params().model, "llama3.2");
    }

    #[test]
    fn test_openai_constructor() {
        let provider = Provider::openai("sk-test".into());
        assert_eq!(provider.kind(), ProviderKind::OpenAi);
        assert_eq!(provider.config().base_url, OPENAI_BASE_URL);
    }

    #[test]
    fn test_ollama_custom_host() {
        let provider = Provider::ollama("http://gpu-box:11434/");
        assert_eq!(provider.config().base_url, "http://gpu-box:11434/v1");
    }

    #[test]
    fn test_build_request_uses_params() {
        let client = CompletionClient::from_settings(&settings(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("TEMPERATURE", "0.2"),
            ("MAX_TOKENS", "512"),
        ]))
        .unwrap();

        let request = client.build_request(vec![ChatMessage::system("s"), ChatMessage::user("u")]);
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.temperature, 0.2);
        assert_eq!(request.max_tokens, 512);
        assert_eq!(request.messages.len(), 2);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(ChatMessage::system("hi")).unwrap();
        assert_eq!(json, serde_json::json!({ "role": "system", "content": "hi" }));
    }
}
