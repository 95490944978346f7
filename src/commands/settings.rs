use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::llm::{OLLAMA_HOST, OPENAI_BASE_URL};
use crate::prompt::DEFAULT_CONTEXT_BUDGET;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Environment keys recognised by [`Settings::from_env`].
pub const SETTING_KEYS: &[&str] = &[
    "LLM_PROVIDER",
    "OPENAI_API_KEY",
    "OPENAI_BASE_URL",
    "OPENAI_MODEL",
    "OLLAMA_HOST",
    "OLLAMA_MODEL",
    "TEMPERATURE",
    "MAX_TOKENS",
    "CONTEXT_BUDGET",
    "REQUEST_TIMEOUT_SECS",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown provider: {0} (expected \"openai\" or \"ollama\")")]
    UnknownProvider(String),
    #[error("{provider} API key not found. Set {key} in .env or the environment")]
    MissingApiKey {
        provider: ProviderKind,
        key: &'static str,
    },
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Ollama,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            _ => Err(ConfigError::UnknownProvider(s.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => f.write_str("openai"),
            ProviderKind::Ollama => f.write_str("ollama"),
        }
    }
}

/// Values given on the command line, applied on top of the environment.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// Resolved configuration. Built once at startup and never mutated afterwards.
#[derive(Clone)]
pub struct Settings {
    pub provider: ProviderKind,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub ollama_host: String,
    pub ollama_model: String,
    pub model_override: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub context_budget: usize,
    pub request_timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            openai_api_key: None,
            openai_base_url: OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            ollama_host: OLLAMA_HOST.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            model_override: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            context_budget: DEFAULT_CONTEXT_BUDGET,
            request_timeout: None,
        }
    }
}

impl Settings {
    /// Read settings from the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(provider) = get("LLM_PROVIDER") {
            settings.provider = provider.parse()?;
        }
        settings.openai_api_key = get("OPENAI_API_KEY");
        if let Some(url) = get("OPENAI_BASE_URL") {
            settings.openai_base_url = url;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            settings.openai_model = model;
        }
        if let Some(host) = get("OLLAMA_HOST") {
            settings.ollama_host = host;
        }
        if let Some(model) = get("OLLAMA_MODEL") {
            settings.ollama_model = model;
        }
        if let Some(raw) = get("TEMPERATURE") {
            settings.temperature = validate_temperature(parse_value("TEMPERATURE", &raw)?)?;
        }
        if let Some(raw) = get("MAX_TOKENS") {
            settings.max_tokens = parse_positive("MAX_TOKENS", &raw)?;
        }
        if let Some(raw) = get("CONTEXT_BUDGET") {
            settings.context_budget = parse_positive("CONTEXT_BUDGET", &raw)?;
        }
        if let Some(raw) = get("REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_positive("REQUEST_TIMEOUT_SECS", &raw)?;
            settings.request_timeout = Some(Duration::from_secs(secs));
        }

        Ok(settings)
    }

    pub fn with_overrides(mut self, overrides: SettingsOverrides) -> Result<Self, ConfigError> {
        if let Some(provider) = overrides.provider {
            self.provider = provider.parse()?;
        }
        if let Some(model) = overrides.model.filter(|m| !m.trim().is_empty()) {
            self.model_override = Some(model);
        }
        if let Some(temperature) = overrides.temperature {
            self.temperature = validate_temperature(temperature)?;
        }
        Ok(self)
    }

    /// Model for the selected provider, honouring an explicit override.
    pub fn model(&self) -> &str {
        if let Some(model) = &self.model_override {
            return model;
        }
        match self.provider {
            ProviderKind::OpenAi => &self.openai_model,
            ProviderKind::Ollama => &self.ollama_model,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("provider", &self.provider)
            .field("openai_api_key", &self.openai_api_key.as_deref().map(mask_secret))
            .field("openai_base_url", &self.openai_base_url)
            .field("ollama_host", &self.ollama_host)
            .field("model", &self.model())
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("context_budget", &self.context_budget)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Mask API keys for display
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}

fn parse_value<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_positive<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: fmt::Display,
{
    let value: T = parse_value(key, raw)?;
    if value <= T::default() {
        return Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn validate_temperature(value: f32) -> Result<f32, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            key: "TEMPERATURE",
            value: value.to_string(),
            reason: "must be between 0.0 and 1.0".to_string(),
        })
    }
}
