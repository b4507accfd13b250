//! Transcription client — adapter for the external speech-to-text service.
//!
//! Transcription itself is out of scope; this client only speaks the consumed
//! interface: `transcribe(file_path, language)` returning timestamped
//! segments plus the full text. Transient upstream failures are retried with
//! backoff; a missing audio file (404) is not retried.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use verity_core::config::TranscriptionConfig;
use verity_core::models::Segment;

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("Audio file not found: {file_path}")]
    NotFound { file_path: String },

    #[error("Transcription API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct TranscribeRequest<'a> {
    file_path: &'a str,
    language: &'a str,
}

/// The consumed transcription result shape.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptResult {
    pub segments: Vec<Segment>,
    pub full_text: String,
    pub language: String,
}

pub struct TranscriptionClient {
    client: Client,
    base_url: String,
    max_retries: usize,
    retry_delay_ms: u64,
}

impl TranscriptionClient {
    pub fn new(config: &TranscriptionConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            max_retries: 3,
            retry_delay_ms: 1000,
        })
    }

    pub async fn transcribe(
        &self,
        file_path: &str,
        language: &str,
    ) -> Result<TranscriptResult, TranscriptionError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.max_retries);

        RetryIf::spawn(
            retry_strategy,
            || self.transcribe_once(file_path, language),
            |e: &TranscriptionError| !matches!(e, TranscriptionError::NotFound { .. }),
        )
        .await
    }

    async fn transcribe_once(
        &self,
        file_path: &str,
        language: &str,
    ) -> Result<TranscriptResult, TranscriptionError> {
        let url = format!("{}/transcribe", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&TranscribeRequest {
                file_path,
                language,
            })
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(TranscriptionError::NotFound {
                file_path: file_path.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), "transcription API error");
            return Err(TranscriptionError::Api {
                code: status.as_u16(),
                message: body,
            });
        }

        Ok(response.json::<TranscriptResult>().await?)
    }
}

// ============================================================================
// TESTS
// ============================================================================
