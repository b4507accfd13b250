//! Consensus aggregator — scatter/gather over the configured judge panel.
//!
//! One attempt per configured provider, polled concurrently inside the
//! request future: dropping the request (caller timeout, client disconnect)
//! cancels every in-flight provider call. No provider's failure cancels
//! another's attempt; each outcome lands in its own panel slot, success or
//! error. Reduction is a majority vote with a deterministic tie-break:
//! buckets are scanned in the fixed order TRUE, FALSE, UNCERTAIN and the
//! first maximum wins, so a decisive verdict beats UNCERTAIN on equal counts
//! and TRUE beats FALSE.

use std::sync::Arc;
use thiserror::Error;

use crate::models::{ConsensusResult, Judgement, Verdict};
use crate::normalize::{extract_json_object, normalize_judgement};
use crate::judges::JudgeBackend;

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("text is required")]
    EmptyClaim,

    #[error("No providers configured. Set OLLAMA_MODEL or GEMINI_API_KEY or GROQ_API_KEY")]
    NoProviders,
}

/// The configured judge panel plus the calibration floor. Built once at the
/// composition root and shared across requests.
pub struct JudgePanel {
    judges: Vec<Arc<dyn JudgeBackend>>,
    decision_floor: f64,
}

impl JudgePanel {
    pub fn new(judges: Vec<Arc<dyn JudgeBackend>>, decision_floor: f64) -> Self {
        Self {
            judges,
            decision_floor,
        }
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.judges.iter().map(|j| j.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.judges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.judges.is_empty()
    }

    /// Verify one claim against every configured provider and reconcile the
    /// disagreeing verdicts into a single result.
    ///
    /// Provider-level failures are contained per panel entry; only the
    /// whole-request preconditions (empty claim, empty panel) escalate.
    pub async fn verify_claim(&self, claim: &str) -> Result<ConsensusResult, ConsensusError> {
        let claim = claim.trim();
        if claim.is_empty() {
            return Err(ConsensusError::EmptyClaim);
        }
        if self.judges.is_empty() {
            return Err(ConsensusError::NoProviders);
        }

        // Not spawned: the attempts live inside this future, so cancelling
        // the request cancels every in-flight provider call with it.
        let attempts = self
            .judges
            .iter()
            .map(|judge| judge_one(judge.as_ref(), claim, self.decision_floor));
        let panel = futures::future::join_all(attempts).await;

        Ok(reduce(claim, panel))
    }
}

/// One provider's attempt: call, extract, normalize. Every error becomes a
/// Failure entry; nothing propagates.
async fn judge_one(judge: &dyn JudgeBackend, claim: &str, floor: f64) -> Judgement {
    let provider = judge.name().to_string();

    let raw = match judge.judge(claim).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(provider = %provider, error = %e, "judge call failed");
            return Judgement::Failure {
                provider,
                error: e.to_string(),
            };
        }
    };

    match extract_json_object(&raw) {
        Ok(value) => {
            let n = normalize_judgement(&value, floor);
            Judgement::Success {
                provider,
                verdict: n.verdict,
                confidence: n.confidence,
                rationale: n.rationale,
            }
        }
        Err(e) => {
            tracing::warn!(provider = %provider, error = %e, "judge output unparseable");
            Judgement::Failure {
                provider,
                error: e.to_string(),
            }
        }
    }
}

/// Majority-vote reduction over the settled panel.
fn reduce(claim: &str, panel: Vec<Judgement>) -> ConsensusResult {
    let mut counts = [0usize; 3];
    let mut confidences = Vec::new();
    let mut rationales = Vec::new();

    for entry in &panel {
        if let Judgement::Success {
            provider,
            verdict,
            confidence,
            rationale,
        } = entry
        {
            let bucket = match verdict {
                Verdict::True => 0,
                Verdict::False => 1,
                Verdict::Uncertain => 2,
            };
            counts[bucket] += 1;
            confidences.push(*confidence);
            if !rationale.is_empty() {
                rationales.push(format!("[{}] {}", provider, rationale));
            }
        }
    }

    // First maximum in fixed enumeration order: TRUE wins ties over FALSE,
    // UNCERTAIN never wins a tie against a decisive bucket. An all-failure
    // panel reduces to UNCERTAIN.
    let mut verdict = Verdict::Uncertain;
    let mut best = 0usize;
    for (candidate, count) in Verdict::ALL.iter().zip(counts) {
        if count > best {
            verdict = *candidate;
            best = count;
        }
    }

    let score = if confidences.is_empty() {
        0.0
    } else {
        let mean = confidences.iter().sum::<f64>() / confidences.len() as f64;
        (mean * 1000.0).round() / 1000.0
    };

    let explanation = if rationales.is_empty() {
        "No rationale available.".to_string()
    } else {
        rationales
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join(" | ")
    };

    ConsensusResult {
        query: claim.to_string(),
        verdict,
        score,
        explanation,
        panel,
    }
}

// ============================================================================
// TESTS
// ============================================================================
