use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::{
    config::{LlmConfig, LlmProvider},
    sources::{Evaluator, EvaluatorResponse},
};

use super::EvaluatorError;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct ChatEvaluator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl ChatEvaluator {
    /// Build a client from config, reading the API key from the configured
    /// environment variable. Ollama runs without a key.
    pub fn from_config(config: &LlmConfig) -> Result<Self, EvaluatorError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        if api_key.is_none() && config.provider == LlmProvider::OpenAi {
            return Err(EvaluatorError::MissingApiKey(config.api_key_env.clone()));
        }

        Self::new(config, api_key)
    }

    pub fn new(config: &LlmConfig, api_key: Option<String>) -> Result<Self, EvaluatorError> {
        let base_url = config.base_url.clone().unwrap_or_else(|| {
            match config.provider {
                LlmProvider::OpenAi => OPENAI_BASE_URL,
                LlmProvider::Ollama => OLLAMA_BASE_URL,
            }
            .to_string()
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn complete(&self, prompt: &str, system_prompt: &str) -> Result<String, EvaluatorError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            let auth = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| EvaluatorError::InvalidApiKey)?;
            headers.insert(AUTHORIZATION, auth);
        }

        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(&body)
            .send()?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EvaluatorError::Status(status, text));
        }

        let parsed: ChatResponse = resp
            .json()
            .map_err(|e| EvaluatorError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| EvaluatorError::Parse("response has no message content".to_string()))
    }
}

impl Evaluator for ChatEvaluator {
    fn generate(&self, prompt: &str, system_prompt: &str) -> EvaluatorResponse {
        match self.complete(prompt, system_prompt) {
            Ok(text) => EvaluatorResponse::ok(text),
            Err(e) => {
                log::warn!("model={} outcome=failed err={e}", self.model);
                EvaluatorResponse::failed()
            }
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}
