//! Segment classifier adapter — labels each transcript segment CLAIM or FACT.
//!
//! The classification itself is an external single-shot completion call; this
//! module owns the call adapter, the label parsing, and the explicit fallback
//! policy: ambiguous or failed classifications never raise, they default to
//! FACT.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::judges::JudgeError;
use crate::models::SentenceType;

/// Sentinel emitted when the classification call fails. Contains neither
/// "CLAIM" nor "FACT", so `parse_classification` applies the default rule.
pub const CLASSIFICATION_FAILED: &str = "classification unavailable";

const CLASSIFY_SYSTEM: &str =
    "Classify the sentence as CLAIM (an assertion requiring verification) or \
     FACT (an evidentiary statement). Answer with exactly one word.";

// ============================================================================
// ClassifierBackend trait
// ============================================================================

/// Single-shot text classification. Infallible by contract: call failures
/// surface as a sentinel label, handled by the default-to-FACT rule. No
/// retries; calls across segments are independent and may run concurrently.
#[async_trait]
pub trait ClassifierBackend: Send + Sync {
    async fn classify(&self, text: &str) -> String;
}

/// Map a raw classification label to a sentence type. Any case-insensitive
/// occurrence of "CLAIM" wins; otherwise "FACT"; otherwise the FACT default.
pub fn parse_classification(raw: &str) -> SentenceType {
    let upper = raw.to_uppercase();
    if upper.contains("CLAIM") {
        SentenceType::Claim
    } else {
        SentenceType::Fact
    }
}

// ============================================================================
// Gemini completion client (shared with the relationship judge)
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest {
    contents: Vec<CompletionContent>,
}

#[derive(Debug, Serialize)]
struct CompletionContent {
    role: &'static str,
    parts: Vec<CompletionPart>,
}

#[derive(Debug, Serialize)]
struct CompletionPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    candidates: Vec<CompletionCandidate>,
}

#[derive(Debug, Deserialize)]
struct CompletionCandidate {
    content: Option<CompletionResponseContent>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponseContent {
    #[serde(default)]
    parts: Vec<CompletionResponsePart>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponsePart {
    text: Option<String>,
}

/// Plain single-shot Gemini text completion. Unlike the judge client the key
/// is checked per call, so a missing credential degrades the call (and lets
/// the graph builder's failure semantics apply) instead of failing startup.
#[derive(Debug, Clone)]
pub struct GeminiCompletionClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiCompletionClient {
    pub fn new(model: String, api_key: String) -> Result<Self, JudgeError> {
        Self::with_base_url(
            model,
            api_key,
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
        )
    }

    pub fn with_base_url(
        model: String,
        api_key: String,
        base_url: String,
    ) -> Result<Self, JudgeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url,
        })
    }

    pub async fn generate(&self, prompt: String) -> Result<String, JudgeError> {
        if self.api_key.is_empty() {
            return Err(JudgeError::MissingEnv {
                var: "GEMINI_API_KEY".to_string(),
            });
        }

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let request = CompletionRequest {
            contents: vec![CompletionContent {
                role: "user",
                parts: vec![CompletionPart { text: prompt }],
            }],
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JudgeError::Api {
                code: status.as_u16(),
                message: body,
            });
        }

        let payload: CompletionResponse = response.json().await?;
        let text = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|t| !t.is_empty());

        text.ok_or_else(|| JudgeError::EmptyResponse {
            provider: format!("gemini:{}", self.model),
        })
    }
}

// ============================================================================
// GeminiClassifier
// ============================================================================

/// Classifier backed by the Gemini completion client. One attempt per
/// segment; failures are logged and collapse to the sentinel label.
pub struct GeminiClassifier {
    inner: GeminiCompletionClient,
}

impl GeminiClassifier {
    pub fn new(inner: GeminiCompletionClient) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ClassifierBackend for GeminiClassifier {
    async fn classify(&self, text: &str) -> String {
        let prompt = format!("{}\n\nSentence: {}", CLASSIFY_SYSTEM, text);
        match self.inner.generate(prompt).await {
            Ok(label) => label,
            Err(e) => {
                tracing::warn!(error = %e, "segment classification failed, defaulting to FACT");
                CLASSIFICATION_FAILED.to_string()
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion_ok(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
    }

    #[test]
    fn test_parse_classification_claim_wins() {
        assert_eq!(parse_classification("CLAIM"), SentenceType::Claim);
        assert_eq!(
            parse_classification("this is a claim, I think"),
            SentenceType::Claim
        );
        // CLAIM beats FACT when both occur
        assert_eq!(
            parse_classification("claim or fact? CLAIM"),
            SentenceType::Claim
        );
    }

    #[test]
    fn test_parse_classification_fact_and_default() {
        assert_eq!(parse_classification("FACT"), SentenceType::Fact);
        assert_eq!(parse_classification("fact."), SentenceType::Fact);
        // Ambiguous output defaults to FACT
        assert_eq!(parse_classification("no idea"), SentenceType::Fact);
        assert_eq!(parse_classification(""), SentenceType::Fact);
        assert_eq!(
            parse_classification(CLASSIFICATION_FAILED),
            SentenceType::Fact
        );
    }

    #[tokio::test]
    async fn test_classifier_returns_raw_label() {
        let server = MockServer::start().await;
        let inner = GeminiCompletionClient::with_base_url(
            "gemini-1.5-flash".to_string(),
            "test-key".to_string(),
            server.uri(),
        )
        .unwrap();
        let classifier = GeminiClassifier::new(inner);

        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_ok("CLAIM")))
            .mount(&server)
            .await;

        let label = classifier.classify("the moon landing was staged").await;
        assert_eq!(parse_classification(&label), SentenceType::Claim);
    }

    #[tokio::test]
    async fn test_classifier_failure_collapses_to_sentinel() {
        let server = MockServer::start().await;
        let inner = GeminiCompletionClient::with_base_url(
            "gemini-1.5-flash".to_string(),
            "test-key".to_string(),
            server.uri(),
        )
        .unwrap();
        let classifier = GeminiClassifier::new(inner);

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .expect(1) // single attempt, no retries
            .mount(&server)
            .await;

        let label = classifier.classify("anything").await;
        assert_eq!(label, CLASSIFICATION_FAILED);
        assert_eq!(parse_classification(&label), SentenceType::Fact);
    }

    #[tokio::test]
    async fn test_missing_api_key_degrades_per_call() {
        let inner = GeminiCompletionClient::with_base_url(
            "gemini-1.5-flash".to_string(),
            String::new(),
            "http://127.0.0.1:1".to_string(),
        )
        .unwrap();
        let classifier = GeminiClassifier::new(inner);

        let label = classifier.classify("anything").await;
        assert_eq!(label, CLASSIFICATION_FAILED);
    }
}
