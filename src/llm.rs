//! LLM provider abstraction and implementations.
//!
//! Defines the [`LlmProvider`] trait and two concrete providers:
//! - **[`OpenAiProvider`]**: `POST {endpoint}/chat/completions` with a system and a user message.
//! - **[`GeminiProvider`]**: `POST {endpoint}/models/{model}:generateContent` with a single text part.
//!
//! Both return the raw completion text; turning it into typed values is the
//! job of [`crate::decode`].
//!
//! # Retry Strategy
//!
//! [`complete_with_retry`] retries a call up to `max_attempts` times with a
//! linear backoff of 300ms × attempt:
//! - network errors, HTTP 429 and 5xx → retry
//! - other HTTP 4xx → fail immediately
//! - a successful response without choices/candidates → fail immediately

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;

const OPENAI_DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const GEMINI_DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1";
const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-pro-002";

/// Backoff step between attempts.
pub const RETRY_BACKOFF_STEP: Duration = Duration::from_millis(300);

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("empty completion from {0}")]
    EmptyCompletion(&'static str),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Transport(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::EmptyCompletion(_) => false,
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider identifier (`"openai"`, `"gemini"`).
    fn name(&self) -> &str;

    /// Run one completion and return the response text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// Whether a collection-shaped decode may fall back to a single wrapped value.
    fn wraps_single_values(&self) -> bool {
        false
    }
}

/// Call `provider` with retry and linear backoff.
pub async fn complete_with_retry(
    provider: &dyn LlmProvider,
    system: &str,
    user: &str,
    max_attempts: u32,
) -> Result<String, LlmError> {
    let attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match provider.complete(system, user).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_retryable() && attempt < attempts => {
                tracing::debug!(provider = provider.name(), attempt, error = %e, "retrying LLM call");
                tokio::time::sleep(RETRY_BACKOFF_STEP * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// ============ OpenAI ============

pub struct OpenAiProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            http: build_http(config)?,
            endpoint: non_empty_or(&config.endpoint, OPENAI_DEFAULT_ENDPOINT),
            api_key,
            model: non_empty_or(&config.model, OPENAI_DEFAULT_MODEL),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });
        if self.max_tokens > 0 {
            body["max_tokens"] = self.max_tokens.into();
        }
        if let Some(t) = self.temperature {
            body["temperature"] = t.into();
        }

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.endpoint))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: "openai",
                status: status.as_u16(),
                body,
            });
        }

        chat_text(resp.json().await?)
    }
}

/// Text of the first choice; no choices is an empty completion.
fn chat_text(parsed: ChatResponse) -> Result<String, LlmError> {
    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or(LlmError::EmptyCompletion("openai"))
}

// ============ Gemini ============

pub struct GeminiProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl GeminiProvider {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            http: build_http(config)?,
            endpoint: non_empty_or(&config.endpoint, GEMINI_DEFAULT_ENDPOINT),
            api_key,
            model: non_empty_or(&config.model, GEMINI_DEFAULT_MODEL),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let mut body = serde_json::json!({
            "contents": [
                { "parts": [ { "text": format!("{}\n{}", system, user) } ] }
            ],
        });
        let mut generation = serde_json::Map::new();
        if self.max_tokens > 0 {
            generation.insert("maxOutputTokens".into(), self.max_tokens.into());
        }
        if let Some(t) = self.temperature {
            generation.insert("temperature".into(), t.into());
        }
        if !generation.is_empty() {
            body["generationConfig"] = generation.into();
        }

        let resp = self
            .http
            .post(format!(
                "{}/models/{}:generateContent",
                self.endpoint, self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: "gemini",
                status: status.as_u16(),
                body,
            });
        }

        gemini_text(resp.json().await?)
    }

    fn wraps_single_values(&self) -> bool {
        true
    }
}

fn gemini_text(parsed: GeminiResponse) -> Result<String, LlmError> {
    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .map(|p| p.text)
        .ok_or(LlmError::EmptyCompletion("gemini"))
}

fn build_http(config: &LlmConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

fn api_key(config: &LlmConfig, env_var: &str) -> Option<String> {
    Some(config.api_key.trim().to_string())
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|k| !k.is_empty()))
}

/// Create the configured [`LlmProvider`].
///
/// # Supported Providers
///
/// | Config Value | Provider | Key fallback |
/// |-------------|----------|--------------|
/// | `"openai"` (or empty) | [`OpenAiProvider`] | `OPENAI_API_KEY` |
/// | `"gemini"` | [`GeminiProvider`] | `GEMINI_API_KEY` |
///
/// # Errors
///
/// Returns an error for unknown provider names or a missing API key.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.provider.as_str() {
        "" | "openai" => {
            let Some(key) = api_key(config, "OPENAI_API_KEY") else {
                bail!("missing OpenAI API key (set llm.api_key or OPENAI_API_KEY)");
            };
            Ok(Arc::new(OpenAiProvider::new(config, key)?))
        }
        "gemini" => {
            let Some(key) = api_key(config, "GEMINI_API_KEY") else {
                bail!("missing Gemini API key (set llm.api_key or GEMINI_API_KEY)");
            };
            Ok(Arc::new(GeminiProvider::new(config, key)?))
        }
        other => bail!("unsupported LLM provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays a scripted sequence of outcomes.
    struct Scripted {
        outcomes: Mutex<Vec<Result<String, LlmError>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(mut outcomes: Vec<Result<String, LlmError>>) -> Self {
            outcomes.reverse();
            Self {
                outcomes: Mutex::new(outcomes),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            *self.calls.lock().unwrap() += 1;
            self.outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(LlmError::EmptyCompletion("scripted")))
        }
    }

    fn server_error() -> LlmError {
        LlmError::Api {
            provider: "openai",
            status: 503,
            body: "overloaded".into(),
        }
    }

    #[test]
    fn retry_classification() {
        assert!(server_error().is_retryable());
        assert!(LlmError::Api {
            provider: "openai",
            status: 429,
            body: String::new()
        }
        .is_retryable());
        assert!(!LlmError::Api {
            provider: "openai",
            status: 401,
            body: String::new()
        }
        .is_retryable());
        assert!(!LlmError::EmptyCompletion("openai").is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_with_linear_backoff() {
        let provider = Scripted::new(vec![
            Err(server_error()),
            Err(server_error()),
            Ok("{}".into()),
        ]);
        let started = tokio::time::Instant::now();
        let text = complete_with_retry(&provider, "sys", "user", 3).await.unwrap();
        assert_eq!(text, "{}");
        assert_eq!(provider.calls(), 3);
        // 300ms after the first failure, 600ms after the second.
        assert_eq!(started.elapsed(), Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let provider = Scripted::new(vec![
            Err(server_error()),
            Err(server_error()),
            Err(server_error()),
            Ok("never reached".into()),
        ]);
        let err = complete_with_retry(&provider, "sys", "user", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 503, .. }));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_completion_is_permanent() {
        let provider = Scripted::new(vec![
            Err(LlmError::EmptyCompletion("openai")),
            Ok("{}".into()),
        ]);
        let err = complete_with_retry(&provider, "sys", "user", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyCompletion(_)));
        assert_eq!(provider.calls(), 1);
    }

    fn chat(json: &str) -> Result<String, LlmError> {
        chat_text(serde_json::from_str(json).unwrap())
    }

    fn gemini(json: &str) -> Result<String, LlmError> {
        gemini_text(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn chat_response_text() {
        assert_eq!(
            chat(r#"{"choices": [{"message": {"content": "{\"a\": 1}"}}]}"#).unwrap(),
            r#"{"a": 1}"#
        );
        assert!(matches!(
            chat(r#"{"choices": []}"#),
            Err(LlmError::EmptyCompletion("openai"))
        ));
        assert!(matches!(chat("{}"), Err(LlmError::EmptyCompletion("openai"))));
    }

    #[test]
    fn gemini_response_text() {
        assert_eq!(
            gemini(r#"{"candidates": [{"content": {"parts": [{"text": "ok"}]}}]}"#).unwrap(),
            "ok"
        );
        for empty in [
            r#"{"candidates": []}"#,
            r#"{}"#,
            r#"{"candidates": [{"finishReason": "SAFETY"}]}"#,
            r#"{"candidates": [{"content": {"parts": []}}]}"#,
        ] {
            assert!(
                matches!(gemini(empty), Err(LlmError::EmptyCompletion("gemini"))),
                "{}",
                empty
            );
        }
    }

    #[test]
    fn unsupported_provider_rejected() {
        let config = LlmConfig {
            provider: "watson".into(),
            ..Default::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("unsupported LLM provider"));
    }

    #[test]
    fn explicit_key_builds_provider() {
        let config = LlmConfig {
            provider: "gemini".into(),
            api_key: "k".into(),
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "gemini");
        assert!(provider.wraps_single_values());
    }

    #[test]
    fn endpoint_defaults_and_trailing_slash() {
        assert_eq!(non_empty_or("", OPENAI_DEFAULT_ENDPOINT), OPENAI_DEFAULT_ENDPOINT);
        assert_eq!(
            non_empty_or("http://localhost:8080/v1/", OPENAI_DEFAULT_ENDPOINT),
            "http://localhost:8080/v1"
        );
    }
}
