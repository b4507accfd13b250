use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use verity_core::classify::{GeminiClassifier, GeminiCompletionClient};
use verity_core::consensus::JudgePanel;
use verity_core::graph::GeminiRelationshipJudge;
use verity_core::judges::{GeminiJudge, GroqJudge, JudgeBackend, ModelFallback, OpenAiCompatJudge};
use verity_core::VerityConfig;

use verity_server::delivery::DeliveryChannel;
use verity_server::http::{start_http_server, HttpState};
use verity_server::subsystems::extract::ExtractPipeline;
use verity_server::transcription::TranscriptionClient;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "verity.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

fn env_nonempty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

/// Assemble the judge panel from whichever providers have credentials in the
/// environment. A missing provider is skipped, never fatal; zero providers is
/// surfaced at request time.
fn build_panel(config: &VerityConfig) -> JudgePanel {
    let judges_config = &config.judges;
    let mut judges: Vec<Arc<dyn JudgeBackend>> = Vec::new();

    if let Some(model) = env_nonempty("OLLAMA_MODEL").or_else(|| judges_config.ollama_model.clone())
    {
        match OpenAiCompatJudge::ollama(model) {
            Ok(judge) => judges.push(Arc::new(judge)),
            Err(e) => tracing::warn!(error = %e, "ollama judge skipped"),
        }
    }

    if env_nonempty("GEMINI_API_KEY").is_some() {
        let model =
            env_nonempty("GEMINI_MODEL").unwrap_or_else(|| judges_config.gemini_model.clone());
        match GeminiJudge::new(model) {
            Ok(judge) => judges.push(Arc::new(judge)),
            Err(e) => tracing::warn!(error = %e, "gemini judge skipped"),
        }
    }

    if env_nonempty("GROQ_API_KEY").is_some() {
        let model = env_nonempty("GROQ_MODEL").unwrap_or_else(|| judges_config.groq_model.clone());
        let fallback = ModelFallback::new(
            judges_config.groq_fallback_models.clone(),
            judges_config.decommission_codes.clone(),
        );
        match GroqJudge::new(model, fallback) {
            Ok(judge) => judges.push(Arc::new(judge)),
            Err(e) => tracing::warn!(error = %e, "groq judge skipped"),
        }
    }

    let decision_floor = env_nonempty("MIN_CONFIDENCE_FOR_DECISION")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(judges_config.decision_floor);

    JudgePanel::new(judges, decision_floor)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match VerityConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let panel = build_panel(&config);

    if args.health {
        if panel.is_empty() {
            println!("❌ No judge providers configured");
            std::process::exit(1);
        }
        for name in panel.provider_names() {
            println!("✅ judge provider: {}", name);
        }
        println!("✅ Verity health check passed");
        return Ok(());
    }

    if panel.is_empty() {
        tracing::warn!(
            "No judge providers configured. Set OLLAMA_MODEL or GEMINI_API_KEY or GROQ_API_KEY"
        );
    } else {
        tracing::info!(providers = ?panel.provider_names(), "judge panel ready");
    }

    // Classification and relationship analysis share one Gemini completion
    // client; an empty API key degrades per call instead of failing startup.
    let gemini_key = env_nonempty("GEMINI_API_KEY").unwrap_or_default();
    let completion_model =
        env_nonempty("GEMINI_MODEL").unwrap_or_else(|| config.judges.gemini_model.clone());
    let classifier_client = GeminiCompletionClient::new(completion_model.clone(), gemini_key.clone())?;
    let relationship_client = GeminiCompletionClient::new(completion_model, gemini_key)?;

    let pipeline = ExtractPipeline::new(
        Arc::new(GeminiClassifier::new(classifier_client)),
        Arc::new(GeminiRelationshipJudge::new(relationship_client)),
        config.graph.clone(),
    );

    let delivery = DeliveryChannel::new(&config.delivery)?;
    let transcription = TranscriptionClient::new(&config.transcription)?;

    // Shutdown signal
    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    if !config.http.enabled {
        tracing::warn!("HTTP API disabled by config; nothing to serve");
        return Ok(());
    }

    let state = Arc::new(HttpState {
        config,
        panel: Arc::new(panel),
        pipeline: Arc::new(pipeline),
        delivery: Arc::new(delivery),
        transcription: Arc::new(transcription),
    });

    start_http_server(state, tx.subscribe()).await
}
