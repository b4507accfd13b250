//! Downstream delivery channel — best-effort push of pipeline events.
//!
//! Results are pushed to a real-time relay as named events. Delivery is
//! attempted against the primary channel first, then the secondary; a
//! delivery failure is reported in the response but never fails the request
//! that produced the result.

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use verity_core::config::DeliveryConfig;

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub sent: bool,
    pub via: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct EventEnvelope<'a> {
    event: &'a str,
    step: &'a str,
    data: &'a serde_json::Value,
    delivery_id: Uuid,
    emitted_at: chrono::DateTime<chrono::Utc>,
}

pub struct DeliveryChannel {
    client: Client,
    primary_url: String,
    fallback_url: Option<String>,
}

impl DeliveryChannel {
    pub fn new(config: &DeliveryConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            primary_url: config.primary_url.clone(),
            fallback_url: config.fallback_url.clone(),
        })
    }

    /// Push one named event. Tries the primary channel, then the fallback;
    /// reports which channel accepted it, or the last error. Never returns Err.
    pub async fn emit(&self, event: &str, data: &serde_json::Value) -> DeliveryReport {
        let envelope = EventEnvelope {
            event,
            step: event,
            data,
            delivery_id: Uuid::new_v4(),
            emitted_at: chrono::Utc::now(),
        };

        let mut last_error = None;

        let mut channels = vec![("primary", self.primary_url.as_str())];
        if let Some(url) = &self.fallback_url {
            channels.push(("fallback", url.as_str()));
        }

        for (label, url) in channels {
            match self.try_send(url, &envelope).await {
                Ok(()) => {
                    tracing::debug!(event = event, via = label, "event delivered");
                    return DeliveryReport {
                        sent: true,
                        via: Some(label.to_string()),
                        error: None,
                    };
                }
                Err(e) => {
                    tracing::warn!(event = event, via = label, error = %e, "event delivery failed");
                    last_error = Some(e);
                }
            }
        }

        DeliveryReport {
            sent: false,
            via: None,
            error: last_error,
        }
    }

    async fn try_send(&self, url: &str, envelope: &EventEnvelope<'_>) -> Result<(), String> {
        let response = self
            .client
            .post(url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("channel returned {}", status.as_u16()));
        }
        Ok(())
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

    fn config(primary: String, fallback: Option<String>) -> DeliveryConfig {
        DeliveryConfig {
            primary_url: primary,
            fallback_url: fallback,
        }
    }

    #[tokio::test]
    async fn test_primary_channel_accepts_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let channel =
            DeliveryChannel::new(&config(format!("{}/events", server.uri()), None)).unwrap();
        let report = channel
            .emit("conclusion", &serde_json::json!({"claims": 2}))
            .await;

        assert!(report.sent);
        assert_eq!(report.via.as_deref(), Some("primary"));
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_falls_back_to_secondary_on_primary_failure() {
        let primary = MockServer::start().await;
        let secondary = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&primary)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&secondary)
            .await;

        let channel =
            DeliveryChannel::new(&config(primary.uri(), Some(secondary.uri()))).unwrap();
        let report = channel.emit("extract", &serde_json::json!({})).await;

        assert!(report.sent);
        assert_eq!(report.via.as_deref(), Some("fallback"));
    }

    #[tokio::test]
    async fn test_total_failure_is_reported_not_raised() {
        let primary = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&primary)
            .await;

        let channel = DeliveryChannel::new(&config(primary.uri(), None)).unwrap();
        let report = channel.emit("verification", &serde_json::json!({})).await;

        assert!(!report.sent);
        assert!(report.via.is_none());
        assert!(report.error.is_some());
    }
}
