//! Judge provider clients — per-provider adapters for claim verification.
//!
//! Provides a `JudgeBackend` trait with implementations for:
//! - **OpenAI-compatible** — any `/v1/chat/completions` endpoint (Ollama, vLLM)
//! - **Gemini** — `generateContent`, retrying once with a `-latest` suffix on 404
//! - **Groq** — OpenAI-compatible, with an ordered model fallback chain for
//!   decommissioned model ids
//!
//! Each client owns its own bounded timeout and `judge()` returns the raw
//! model text; parsing into a structured verdict happens in `normalize`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Per-request prompt sent to every judge. The upstream is asked for strict
/// JSON; the normalizer copes when it does not comply.
const JUDGE_SYSTEM: &str = "You are a factuality judge. Respond in JSON format.";

fn judge_prompt(claim: &str) -> String {
    format!(
        "You are a factuality judge. Return STRICT JSON ONLY with keys: \
         verdict, confidence, rationale.\n\
         verdict is one of TRUE, FALSE, UNCERTAIN. confidence is a number in [0, 1].\n\n\
         CLAIM: {claim}"
    )
}

// ============================================================================
// JudgeBackend trait
// ============================================================================

/// Abstraction over judge providers. `name()` is the `"provider:model"` label
/// attached to panel entries.
#[async_trait]
pub trait JudgeBackend: Send + Sync {
    /// Ask the provider for a verdict on `claim`. Returns the raw model text.
    async fn judge(&self, claim: &str) -> Result<String, JudgeError>;

    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("{var} is not set")]
    MissingEnv { var: String },

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Failed to connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("Model decommissioned and no fallback available for: {model}")]
    ExhaustedFallback { model: String },
}

/// Map a transport error, distinguishing connect/timeout failures (gateway
/// timeout class) from other request errors.
fn transport_error(endpoint: &str, e: reqwest::Error) -> JudgeError {
    if e.is_connect() || e.is_timeout() {
        JudgeError::Connect {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        }
    } else {
        JudgeError::Http(e)
    }
}

fn require_env(var: &str) -> Result<String, JudgeError> {
    match std::env::var(var) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(JudgeError::MissingEnv {
            var: var.to_string(),
        }),
    }
}

// ============================================================================
// Declarative fallback policy
// ============================================================================

/// Ordered model fallback: candidate ids tried heavier-to-lighter when the
/// upstream reports a decommission condition. New fallbacks are data, not
/// code changes.
#[derive(Debug, Clone)]
pub struct ModelFallback {
    pub candidates: Vec<String>,
    pub decommission_codes: Vec<String>,
}

impl ModelFallback {
    pub fn new(candidates: Vec<String>, decommission_codes: Vec<String>) -> Self {
        Self {
            candidates,
            decommission_codes,
        }
    }

    /// True when a 400 response body carries one of the decommission codes.
    fn is_decommissioned(&self, status: u16, body: &str) -> bool {
        if status != 400 {
            return false;
        }
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v["error"]["code"].as_str().map(|c| c.to_string()))
            .map(|code| self.decommission_codes.iter().any(|d| d == &code))
            .unwrap_or(false)
    }
}

impl Default for ModelFallback {
    fn default() -> Self {
        Self {
            candidates: vec![
                "llama-3.3-70b-versatile".to_string(),
                "llama-3.1-8b-instant".to_string(),
                "mixtral-8x7b-32768".to_string(),
            ],
            decommission_codes: vec![
                "model_decommissioned".to_string(),
                "model_not_found".to_string(),
            ],
        }
    }
}

// ============================================================================
// OpenAI-compatible wire structs (shared by Ollama and Groq)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

fn chat_request(model: &str, claim: &str) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage {
                role: "system",
                content: JUDGE_SYSTEM.to_string(),
            },
            ChatMessage {
                role: "user",
                content: judge_prompt(claim),
            },
        ],
        temperature: 0.0,
        max_tokens: 256,
        response_format: ResponseFormat { kind: "json_object" },
    }
}

// ============================================================================
// OpenAiCompatJudge (Ollama and friends)
// ============================================================================

/// Judge backed by any OpenAI-compatible `/v1/chat/completions` endpoint.
/// Used for Ollama; the bearer token is optional.
#[derive(Debug, Clone)]
pub struct OpenAiCompatJudge {
    client: Client,
    host_url: String,
    model: String,
    api_key: Option<String>,
    name: String,
}

impl OpenAiCompatJudge {
    /// Build an Ollama judge from `OLLAMA_HOST_URL`.
    pub fn ollama(model: String) -> Result<Self, JudgeError> {
        let host_url = require_env("OLLAMA_HOST_URL")?;
        Self::new("ollama", host_url, model, None)
    }

    pub fn new(
        provider: &str,
        host_url: String,
        model: String,
        api_key: Option<String>,
    ) -> Result<Self, JudgeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        let name = format!("{}:{}", provider, model);
        Ok(Self {
            client,
            host_url,
            model,
            api_key,
            name,
        })
    }
}

#[async_trait]
impl JudgeBackend for OpenAiCompatJudge {
    async fn judge(&self, claim: &str) -> Result<String, JudgeError> {
        let url = format!("{}/v1/chat/completions", self.host_url);
        let mut request = self.client.post(&url).json(&chat_request(&self.model, claim));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&self.host_url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(provider = %self.name, code = status.as_u16(), "chat completion error");
            return Err(JudgeError::Api {
                code: status.as_u16(),
                message: body,
            });
        }

        let payload: ChatResponse = response.json().await?;
        match payload
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
        {
            Some(content) => Ok(content),
            None => Err(JudgeError::EmptyResponse {
                provider: self.name.clone(),
            }),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// GeminiJudge
// ============================================================================

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

/// Gemini judge. A 404 on the requested model id is retried once with a
/// `-latest` suffix appended (unless already present); a second 404 propagates.
#[derive(Debug, Clone)]
pub struct GeminiJudge {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    name: String,
}

impl GeminiJudge {
    pub fn new(model: String) -> Result<Self, JudgeError> {
        let api_key = require_env("GEMINI_API_KEY")?;
        Self::with_api_key(
            model,
            api_key,
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
        )
    }

    /// Create a client with explicit credentials and base URL (for testing).
    pub fn with_api_key(
        model: String,
        api_key: String,
        base_url: String,
    ) -> Result<Self, JudgeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        let name = format!("gemini:{}", model);
        Ok(Self {
            client,
            api_key,
            model,
            base_url,
            name,
        })
    }

    async fn try_model(&self, model_id: &str, claim: &str) -> Result<String, JudgeError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model_id, self.api_key
        );
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart {
                    text: judge_prompt(claim),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&self.base_url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() != 404 {
                tracing::error!(provider = %self.name, code = status.as_u16(), "Gemini API error");
            }
            return Err(JudgeError::Api {
                code: status.as_u16(),
                message: body,
            });
        }

        let payload: GeminiResponse = response.json().await?;
        let text = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|t| !t.is_empty());

        match text {
            Some(t) => Ok(t),
            None => Err(JudgeError::EmptyResponse {
                provider: self.name.clone(),
            }),
        }
    }
}

#[async_trait]
impl JudgeBackend for GeminiJudge {
    async fn judge(&self, claim: &str) -> Result<String, JudgeError> {
        match self.try_model(&self.model, claim).await {
            Err(JudgeError::Api { code: 404, .. }) if !self.model.ends_with("-latest") => {
                let corrected = format!("{}-latest", self.model);
                tracing::warn!(
                    provider = %self.name,
                    corrected = %corrected,
                    "model id not found, retrying with -latest suffix"
                );
                self.try_model(&corrected, claim).await
            }
            other => other,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// GroqJudge
// ============================================================================

/// Groq judge (OpenAI-compatible wire). On a decommissioned model it walks the
/// declarative fallback chain in order and stops at the first candidate that
/// does not itself report the decommission condition.
#[derive(Debug, Clone)]
pub struct GroqJudge {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    fallback: ModelFallback,
    name: String,
}

impl GroqJudge {
    pub fn new(model: String, fallback: ModelFallback) -> Result<Self, JudgeError> {
        let api_key = require_env("GROQ_API_KEY")?;
        Self::with_api_key(
            model,
            api_key,
            "https://api.groq.com/openai/v1".to_string(),
            fallback,
        )
    }

    /// Create a client with explicit credentials and base URL (for testing).
    pub fn with_api_key(
        model: String,
        api_key: String,
        base_url: String,
        fallback: ModelFallback,
    ) -> Result<Self, JudgeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        let name = format!("groq:{}", model);
        Ok(Self {
            client,
            api_key,
            model,
            base_url,
            fallback,
            name,
        })
    }

    /// One attempt against a concrete model id. `Ok(None)` signals the
    /// decommission condition so the caller can advance the chain.
    async fn try_model(&self, model_id: &str, claim: &str) -> Result<Option<String>, JudgeError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&chat_request(model_id, claim))
            .send()
            .await
            .map_err(|e| transport_error(&self.base_url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if self.fallback.is_decommissioned(status.as_u16(), &body) {
                tracing::warn!(provider = %self.name, model = model_id, "model decommissioned");
                return Ok(None);
            }
            tracing::error!(provider = %self.name, code = status.as_u16(), "Groq API error");
            return Err(JudgeError::Api {
                code: status.as_u16(),
                message: body,
            });
        }

        let payload: ChatResponse = response.json().await?;
        match payload
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
        {
            Some(content) => Ok(Some(content)),
            None => Err(JudgeError::EmptyResponse {
                provider: self.name.clone(),
            }),
        }
    }
}

#[async_trait]
impl JudgeBackend for GroqJudge {
    async fn judge(&self, claim: &str) -> Result<String, JudgeError> {
        if let Some(content) = self.try_model(&self.model, claim).await? {
            return Ok(content);
        }

        for alt in &self.fallback.candidates {
            if let Some(content) = self.try_model(alt, claim).await? {
                tracing::info!(provider = %self.name, fallback = %alt, "answered via fallback model");
                return Ok(content);
            }
        }

        Err(JudgeError::ExhaustedFallback {
            model: self.model.clone(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_ok(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
    }

    fn gemini_ok(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
    }

    #[tokio::test]
    async fn test_openai_compat_returns_raw_content() {
        let server = MockServer::start().await;
        let judge = OpenAiCompatJudge::new(
            "ollama",
            server.uri(),
            "llama3".to_string(),
            None,
        )
        .unwrap();

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3",
                "response_format": { "type": "json_object" }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_ok(r#"{"verdict":"TRUE","confidence":0.9}"#)),
            )
            .mount(&server)
            .await;

        let raw = judge.judge("the sky is blue").await.unwrap();
        assert!(raw.contains("TRUE"));
        assert_eq!(judge.name(), "ollama:llama3");
    }

    #[tokio::test]
    async fn test_openai_compat_non_2xx_is_api_error() {
        let server = MockServer::start().await;
        let judge =
            OpenAiCompatJudge::new("ollama", server.uri(), "llama3".to_string(), None).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        match judge.judge("claim").await {
            Err(JudgeError::Api { code, message }) => {
                assert_eq!(code, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("expected Api error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_openai_compat_empty_content_is_empty_response() {
        let server = MockServer::start().await;
        let judge =
            OpenAiCompatJudge::new("ollama", server.uri(), "llama3".to_string(), None).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_ok("")))
            .mount(&server)
            .await;

        assert!(matches!(
            judge.judge("claim").await,
            Err(JudgeError::EmptyResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_gemini_retries_with_latest_suffix_on_404() {
        let server = MockServer::start().await;
        let judge = GeminiJudge::with_api_key(
            "gemini-1.5-flash".to_string(),
            "test-key".to_string(),
            server.uri(),
        )
        .unwrap();

        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash-latest:generateContent"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(gemini_ok(r#"{"verdict":"FALSE","confidence":0.8}"#)),
            )
            .mount(&server)
            .await;

        let raw = judge.judge("claim").await.unwrap();
        assert!(raw.contains("FALSE"));
    }

    #[tokio::test]
    async fn test_gemini_does_not_double_suffix_latest() {
        let server = MockServer::start().await;
        let judge = GeminiJudge::with_api_key(
            "gemini-1.5-flash-latest".to_string(),
            "test-key".to_string(),
            server.uri(),
        )
        .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .expect(1)
            .mount(&server)
            .await;

        match judge.judge("claim").await {
            Err(JudgeError::Api { code: 404, .. }) => {}
            other => panic!("expected 404 Api error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_gemini_empty_parts_is_empty_response() {
        let server = MockServer::start().await;
        let judge = GeminiJudge::with_api_key(
            "gemini-1.5-flash-latest".to_string(),
            "test-key".to_string(),
            server.uri(),
        )
        .unwrap();

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "candidates": [] })),
            )
            .mount(&server)
            .await;

        assert!(matches!(
            judge.judge("claim").await,
            Err(JudgeError::EmptyResponse { .. })
        ));
    }

    fn decommissioned_body() -> serde_json::Value {
        serde_json::json!({
            "error": { "code": "model_decommissioned", "message": "gone" }
        })
    }

    #[tokio::test]
    async fn test_groq_walks_fallback_chain_on_decommission() {
        let server = MockServer::start().await;
        let fallback = ModelFallback::new(
            vec!["alt-a".to_string(), "alt-b".to_string()],
            vec!["model_decommissioned".to_string(), "model_not_found".to_string()],
        );
        let judge = GroqJudge::with_api_key(
            "old-model".to_string(),
            "test-key".to_string(),
            server.uri(),
            fallback,
        )
        .unwrap();

        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "model": "old-model" })))
            .respond_with(ResponseTemplate::new(400).set_body_json(decommissioned_body()))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "model": "alt-a" })))
            .respond_with(ResponseTemplate::new(400).set_body_json(decommissioned_body()))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "model": "alt-b" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_ok(r#"{"verdict":"TRUE","confidence":0.6}"#)),
            )
            .mount(&server)
            .await;

        let raw = judge.judge("claim").await.unwrap();
        assert!(raw.contains("TRUE"));
    }

    #[tokio::test]
    async fn test_groq_exhausted_fallback_names_original_model() {
        let server = MockServer::start().await;
        let fallback = ModelFallback::new(
            vec!["alt-a".to_string()],
            vec!["model_decommissioned".to_string()],
        );
        let judge = GroqJudge::with_api_key(
            "old-model".to_string(),
            "test-key".to_string(),
            server.uri(),
            fallback,
        )
        .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(decommissioned_body()))
            .mount(&server)
            .await;

        match judge.judge("claim").await {
            Err(JudgeError::ExhaustedFallback { model }) => assert_eq!(model, "old-model"),
            other => panic!("expected ExhaustedFallback, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_groq_plain_400_is_not_treated_as_decommission() {
        let server = MockServer::start().await;
        let judge = GroqJudge::with_api_key(
            "model".to_string(),
            "test-key".to_string(),
            server.uri(),
            ModelFallback::default(),
        )
        .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "code": "invalid_request_error", "message": "bad body" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert!(matches!(
            judge.judge("claim").await,
            Err(JudgeError::Api { code: 400, .. })
        ));
    }
}
