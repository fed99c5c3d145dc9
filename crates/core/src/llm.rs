//! OpenAI-compatible chat generator.
//!
//! Credentials are carried by an explicit [`GeneratorConfig`]; nothing here
//! reads or mutates process-wide state after construction.

use crate::error::{EvalError, ServiceError};
use crate::text::slice_stop_words;
use crate::traits::Generator;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-16k";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const API_BASE_ENV: &str = "OPENAI_API_BASE";

/// Loads `.env` from the working directory. A missing file is fine; a malformed one is not.
pub fn load_dotenv() -> Result<(), EvalError> {
    check_dotenv(dotenvy::dotenv())
}

fn check_dotenv<T>(result: Result<T, dotenvy::Error>) -> Result<(), EvalError> {
    match result {
        Ok(_) => Ok(()),
        Err(dotenvy::Error::Io(error)) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(EvalError::Configuration(format!("cannot load .env: {error}"))),
    }
}

const PROMPT_TEMPLATE: &str = "Given the information, answer the question. If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\nInformation:\n{passages}\n\nQuestion: {question}\n\nHelpful Answer:";

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop_words: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
            stop_words: vec!["\nQuestion:".to_string(), "\n\nInformation:".to_string()],
        }
    }
}

impl GeneratorConfig {
    /// Loads `.env` if present, then reads `OPENAI_API_KEY` and `OPENAI_API_BASE`.
    pub fn from_env(model: impl Into<String>) -> Result<Self, EvalError> {
        load_dotenv()?;
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|key| !key.trim().is_empty());
        let api_base = std::env::var(API_BASE_ENV)
            .ok()
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let config = Self {
            api_key,
            api_base,
            model: model.into(),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// A custom `api_base` may run without a key (local OpenAI-compatible servers);
    /// the public endpoint may not.
    pub fn validate(&self) -> Result<(), EvalError> {
        if self.model.trim().is_empty() {
            return Err(EvalError::Configuration("model name is empty".to_string()));
        }
        if self.api_key.is_none() && self.api_base.trim_end_matches('/') == DEFAULT_API_BASE {
            return Err(EvalError::Configuration(format!(
                "{API_KEY_ENV} is not set; add it to the environment or a .env file"
            )));
        }
        Ok(())
    }
}

pub fn build_prompt(question: &str, context: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{passages}", context)
        .replace("{question}", question)
}

pub struct OpenAiGenerator {
    client: Client,
    config: GeneratorConfig,
}

impl OpenAiGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, EvalError> {
        config.validate()?;
        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn request_body(&self, prompt: &str) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(temperature) = self.config.temperature {
            body["temperature"] = temperature.into();
        }
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }
        body
    }
}

fn parse_completion(body: &Value) -> Result<String, ServiceError> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| ServiceError::BackendResponse {
            backend: "openai".to_string(),
            details: "completion has no message content".to_string(),
        })
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, query: &str, context: &str) -> Result<String, ServiceError> {
        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));
        let prompt = build_prompt(query, context);
        debug!(url = %url, model = %self.config.model, "requesting completion");

        let mut request = self.client.post(&url).json(&self.request_body(&prompt));
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(ServiceError::BackendResponse {
                backend: "openai".to_string(),
                details: format!("{status}: {details}"),
            });
        }

        let body: Value = response.json().await?;
        let answer = parse_completion(&body)?;
        Ok(slice_stop_words(&answer, &self.config.stop_words))
    }
}
