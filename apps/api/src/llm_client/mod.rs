/// LLM Client: the single point of entry for all chat-completion calls.
///
/// ARCHITECTURAL RULE: No other module may call a provider API directly.
/// Every step talks to a `ChatModel`; `LlmClient` is the HTTP implementation.
///
/// Both providers (the general-purpose one and the research one) expose an
/// OpenAI-compatible `/chat/completions` endpoint, so one client type serves both.
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod prompts;

/// Prompts longer than this are truncated when `show_prompts` logging is on.
const PROMPT_LOG_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("No JSON {0} found in LLM output")]
    MissingJson(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
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

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A chat model bound to one provider, model id and temperature.
///
/// Steps hold `Arc<dyn ChatModel>` so tests can swap in scripted fakes.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Sends a full conversation and returns the assistant's text.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// Single-turn convenience wrapper: optional system prompt plus one user prompt.
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        self.chat(&messages).await
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatCompletionResponse {
    /// Extracts the text content of the first choice.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// Connection settings for one provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    /// `None` means no client-side timeout.
    pub timeout: Option<Duration>,
    /// Total attempts per call; 429 and 5xx responses are retried with backoff.
    pub max_attempts: u32,
    pub log_prompts: bool,
}

/// HTTP chat-completions client for one model.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_attempts: u32,
    log_prompts: bool,
}

impl LlmClient {
    pub fn new(
        provider: &ProviderConfig,
        model: impl Into<String>,
        temperature: Option<f32>,
    ) -> Result<Self, LlmError> {
        let mut builder = Client::builder();
        if let Some(timeout) = provider.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: format!("{}/chat/completions", provider.base_url.trim_end_matches('/')),
            api_key: provider.api_key.clone(),
            model: model.into(),
            temperature,
            max_attempts: provider.max_attempts.max(1),
            log_prompts: provider.log_prompts,
        })
    }

    /// Makes a raw call to the provider, returning the full response object.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn call(&self, messages: &[ChatMessage]) -> Result<ChatCompletionResponse, LlmError> {
        let request_body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1).min(6)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ProviderError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let completion: ChatCompletionResponse = response.json().await?;

            if let Some(usage) = &completion.usage {
                debug!(
                    "LLM call succeeded: model={}, prompt_tokens={}, completion_tokens={}",
                    self.model, usage.prompt_tokens, usage.completion_tokens
                );
            }

            return Ok(completion);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: self.max_attempts,
        }))
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        if self.log_prompts {
            if let Some(last) = messages.last() {
                info!(
                    "Calling {}... prompt: {}",
                    self.model,
                    truncate_chars(&last.content, PROMPT_LOG_CHARS)
                );
            }
        }

        let response = self.call(messages).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?.to_string();

        if self.log_prompts {
            info!("Response received from {} ({} chars)", self.model, text.len());
        }

        Ok(text)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Loose JSON helpers
// ────────────────────────────────────────────────────────────────────────────

/// Parses a model reply that is supposed to be a single JSON value.
/// Markdown code fences are stripped first.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    serde_json::from_str(strip_json_fences(text)).map_err(LlmError::Parse)
}

/// Parses a JSON array, falling back to the outermost `[...]` span of free text.
/// Models routinely wrap arrays in prose, so the span runs from the first `[`
/// to the last `]`.
pub fn parse_json_array<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, LlmError> {
    if let Ok(parsed) = parse_json(text) {
        return Ok(parsed);
    }
    static ARRAY: OnceLock<Regex> = OnceLock::new();
    let re = ARRAY.get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("valid regex"));
    let span = re
        .find(text)
        .ok_or(LlmError::MissingJson("array"))?
        .as_str();
    serde_json::from_str(span).map_err(LlmError::Parse)
}

/// Same as [`parse_json_array`] for a `{...}` object.
pub fn parse_json_object<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    if let Ok(parsed) = parse_json(text) {
        return Ok(parsed);
    }
    static OBJECT: OnceLock<Regex> = OnceLock::new();
    let re = OBJECT.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));
    let span = re
        .find(text)
        .ok_or(LlmError::MissingJson("object"))?
        .as_str();
    serde_json::from_str(span).map_err(LlmError::Parse)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str, max_attempts: u32) -> ProviderConfig {
        ProviderConfig {
            base_url: base_url.to_string(),
            api_key: "test-key".to_string(),
            timeout: Some(Duration::from_secs(5)),
            max_attempts,
            log_prompts: false,
        }
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_parse_json_array_inside_prose() {
        let text = "Here are the scores:\n[\n  {\"n\": 1},\n  {\"n\": 2}\n]\nHope this helps.";
        let values: Vec<serde_json::Value> = parse_json_array(text).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1]["n"], 2);
    }

    #[test]
    fn test_parse_json_array_missing() {
        let err = parse_json_array::<serde_json::Value>("no array here").unwrap_err();
        assert!(matches!(err, LlmError::MissingJson("array")));
    }

    #[test]
    fn test_parse_json_object_inside_fences() {
        let text = "```json\n{\"message\": \"hi\"}\n```";
        let value: serde_json::Value = parse_json_object(text).unwrap();
        assert_eq!(value["message"], "hi");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé...");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[tokio::test]
    async fn test_call_returns_first_choice_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Acme builds rockets."}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 4}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = LlmClient::new(&provider(&server.uri(), 1), "sonar", None).unwrap();
        let text = client.complete("Research Acme", None).await.unwrap();
        assert_eq!(text, "Acme builds rockets.");
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"error": {"message": "bad model"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = LlmClient::new(&provider(&server.uri(), 3), "nope", Some(0.0)).unwrap();
        let err = client.complete("hi", Some("sys")).await.unwrap_err();
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad model");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_with_single_attempt_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&server)
            .await;

        let client = LlmClient::new(&provider(&server.uri(), 1), "gpt", None).unwrap();
        let err = client.complete("hi", None).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_empty_content_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "  "}}]
            })))
            .mount(&server)
            .await;

        let client = LlmClient::new(&provider(&server.uri(), 1), "gpt", None).unwrap();
        let err = client.complete("hi", None).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent));
    }
}
