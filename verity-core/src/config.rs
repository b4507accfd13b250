use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct VerityConfig {
    pub service: ServiceConfig,
    #[serde(default)]
    pub judges: JudgesConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct JudgesConfig {
    /// Model ids. API keys and the Ollama host come from the environment;
    /// a provider participates only when its credentials are present.
    pub gemini_model: String,
    pub groq_model: String,
    pub ollama_model: Option<String>,
    /// Ordered Groq fallback candidates, heavier to lighter, tried when the
    /// requested model reports a decommission condition.
    pub groq_fallback_models: Vec<String>,
    /// Upstream 400 error codes treated as "model gone, try the next candidate".
    pub decommission_codes: Vec<String>,
    /// Minimum confidence assigned to a decisive (TRUE/FALSE) verdict that
    /// arrived with zero confidence.
    pub decision_floor: f64,
}

impl Default for JudgesConfig {
    fn default() -> Self {
        Self {
            gemini_model: "gemini-1.5-flash-latest".to_string(),
            groq_model: "llama-3.1-70b-versatile".to_string(),
            ollama_model: None,
            groq_fallback_models: vec![
                "llama-3.3-70b-versatile".to_string(),
                "llama-3.1-8b-instant".to_string(),
                "mixtral-8x7b-32768".to_string(),
            ],
            decommission_codes: vec![
                "model_decommissioned".to_string(),
                "model_not_found".to_string(),
            ],
            decision_floor: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GraphConfig {
    /// How many positions ahead of each node are considered for pairwise
    /// relationship queries (bounds the quadratic judge-call cost).
    pub pairwise_window: usize,
    /// Edges at or below this confidence are dropped, not recorded.
    pub min_edge_confidence: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            pairwise_window: 2,
            min_edge_confidence: 0.3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub base_url: String,
    pub language: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8970".to_string(),
            language: "ko".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeliveryConfig {
    pub primary_url: String,
    pub fallback_url: Option<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            primary_url: "http://127.0.0.1:3001/events".to_string(),
            fallback_url: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8967,
        }
    }
}

impl VerityConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn load_str(raw: &str) -> VerityConfig {
        Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_minimal_config_fills_all_defaults() {
        let cfg = load_str("[service]\nlog_level = \"info\"\n");
        assert_eq!(cfg.judges.gemini_model, "gemini-1.5-flash-latest");
        assert_eq!(cfg.graph.pairwise_window, 2);
        assert_eq!(cfg.http.port, 8967);
    }

    #[test]
    fn test_partial_section_keeps_remaining_defaults() {
        let cfg = load_str(
            "[service]\nlog_level = \"debug\"\n\n\
             [graph]\npairwise_window = 4\n\n\
             [http]\nport = 9000\n",
        );
        assert_eq!(cfg.graph.pairwise_window, 4);
        assert!((cfg.graph.min_edge_confidence - 0.3).abs() < 1e-9);
        assert_eq!(cfg.http.port, 9000);
        assert!(cfg.http.enabled);
        assert_eq!(cfg.http.host, "127.0.0.1");
        assert_eq!(cfg.transcription.language, "ko");
    }
}
