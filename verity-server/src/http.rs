//! Verity HTTP REST API
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a
//! pure inner function. The inner functions are directly testable without
//! axum dispatch machinery.
//!
//! Endpoints:
//! - GET  /health  — health check with configured judge providers
//! - GET  /version — server version info
//! - POST /ask     — verify one claim text against the judge panel
//! - POST /verify  — verify every node of an argument graph (structured or
//!                   legacy embedded-JSON payload) and push the result map
//! - POST /analyze — transcript → classification → argument graph pipeline

use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use verity_core::consensus::{ConsensusError, JudgePanel};
use verity_core::models::ArgumentGraph;
use verity_core::normalize::extract_json_object;
use verity_core::VerityConfig;

use crate::delivery::DeliveryChannel;
use crate::subsystems::{extract::ExtractPipeline, verify};
use crate::transcription::{TranscriptionClient, TranscriptionError};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub config: VerityConfig,
    pub panel: Arc<JudgePanel>,
    pub pipeline: Arc<ExtractPipeline>,
    pub delivery: Arc<DeliveryChannel>,
    pub transcription: Arc<TranscriptionClient>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/ask", post(ask_handler))
        .route("/verify", post(verify_handler))
        .route("/analyze", post(analyze_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);
    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Verity HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub text: String,
}

/// Either a structured argument graph or a legacy text payload carrying the
/// graph as embedded (possibly code-fenced) JSON.
#[derive(Debug, Deserialize, Default)]
pub struct VerifyRequest {
    pub argument_graph: Option<ArgumentGraph>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub file_path: String,
    pub language: Option<String>,
}

fn error_body(msg: impl Into<String>) -> serde_json::Value {
    serde_json::json!({ "error": msg.into(), "status": "error" })
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

pub async fn health_inner(panel: &JudgePanel) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "providers": panel.provider_names(),
        }),
    )
}

pub fn version_inner() -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "protocol": "verity/1",
        }),
    )
}

pub async fn ask_inner(panel: &JudgePanel, req: AskRequest) -> (StatusCode, serde_json::Value) {
    match panel.verify_claim(&req.text).await {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body(e.to_string()),
            ),
        },
        Err(e @ ConsensusError::EmptyClaim) => (StatusCode::BAD_REQUEST, error_body(e.to_string())),
        Err(e @ ConsensusError::NoProviders) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body(e.to_string()),
        ),
    }
}

/// Recover the argument graph from a verify request: structured field first,
/// then the legacy embedded-JSON text form.
pub fn resolve_graph(req: VerifyRequest) -> Result<ArgumentGraph, String> {
    if let Some(graph) = req.argument_graph {
        return Ok(graph);
    }

    let text = req
        .text
        .ok_or_else(|| "argument_graph or text is required".to_string())?;

    let object = extract_json_object(&text).map_err(|e| e.to_string())?;
    // The legacy payload either is the graph or wraps it.
    let graph_value = match object.get("argument_graph") {
        Some(inner) => inner.clone(),
        None => object,
    };
    serde_json::from_value::<ArgumentGraph>(graph_value)
        .map_err(|e| format!("embedded payload is not an argument graph: {}", e))
}

pub async fn verify_inner(
    state: &HttpState,
    req: VerifyRequest,
) -> (StatusCode, serde_json::Value) {
    let graph = match resolve_graph(req) {
        Ok(g) => g,
        Err(e) => return (StatusCode::BAD_REQUEST, error_body(e)),
    };

    if graph.nodes.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            error_body("argument graph has no nodes"),
        );
    }

    let result = match verify::verify_graph(&state.panel, &graph).await {
        Ok(r) => r,
        Err(e @ ConsensusError::NoProviders) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body(e.to_string()),
            )
        }
        Err(e) => return (StatusCode::BAD_REQUEST, error_body(e.to_string())),
    };

    let result_value = match serde_json::to_value(&result) {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body(e.to_string()),
            )
        }
    };

    // Best-effort push; failure is reported, never escalated.
    let report = state.delivery.emit("verification", &result_value).await;

    (
        StatusCode::OK,
        serde_json::json!({
            "ok": true,
            "sent_to_socket": report,
            "result": result_value,
        }),
    )
}

pub async fn analyze_inner(
    state: &HttpState,
    req: AnalyzeRequest,
) -> (StatusCode, serde_json::Value) {
    let language = req
        .language
        .unwrap_or_else(|| state.config.transcription.language.clone());

    let transcript = match state.transcription.transcribe(&req.file_path, &language).await {
        Ok(t) => t,
        Err(e @ TranscriptionError::NotFound { .. }) => {
            return (StatusCode::NOT_FOUND, error_body(e.to_string()))
        }
        Err(e) => return (StatusCode::BAD_GATEWAY, error_body(e.to_string())),
    };

    state
        .delivery
        .emit(
            "transcription",
            &serde_json::json!({ "script": transcript.full_text }),
        )
        .await;

    let extracted = state.pipeline.extract(&transcript.segments).await;

    let extract_payload = serde_json::json!({
        "full_text": transcript.full_text,
        "argument_graph": extracted.argument_graph,
        "summary": extracted.summary,
    });
    state.delivery.emit("extract", &extract_payload).await;

    let conclusion = serde_json::json!({
        "total_segments": extracted.summary.total_segments,
        "claims": extracted.summary.claims,
        "facts": extracted.summary.facts,
        "relationships": extracted.summary.relationships,
        "avg_confidence": extracted.summary.avg_confidence,
    });
    state.delivery.emit("conclusion", &conclusion).await;

    (
        StatusCode::OK,
        serde_json::json!({
            "status": true,
            "argument_graph": extracted.argument_graph,
            "summary": extracted.summary,
            "claim_evidence": extracted.claim_evidence,
        }),
    )
}

// ============================================================================
// Thin axum handlers
// ============================================================================

async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.panel).await;
    (status, Json(body))
}

async fn version_handler() -> impl IntoResponse {
    let (status, body) = version_inner();
    (status, Json(body))
}

async fn ask_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<AskRequest>,
) -> impl IntoResponse {
    let (status, body) = ask_inner(&state.panel, req).await;
    (status, Json(body))
}

async fn verify_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<VerifyRequest>,
) -> impl IntoResponse {
    let (status, body) = verify_inner(&state, req).await;
    (status, Json(body))
}

async fn analyze_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    let (status, body) = analyze_inner(&state, req).await;
    (status, Json(body))
}
