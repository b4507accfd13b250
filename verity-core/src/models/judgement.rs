use serde::{Deserialize, Serialize};

/// Resolved truth classification for a claim.
///
/// The variant order is load-bearing: the consensus reducer scans buckets in
/// this order and keeps the first maximum, so TRUE wins ties over FALSE and a
/// decisive verdict always beats UNCERTAIN on equal counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    True,
    False,
    Uncertain,
}

impl Verdict {
    /// Fixed enumeration order used by the consensus reducer.
    pub const ALL: [Verdict; 3] = [Verdict::True, Verdict::False, Verdict::Uncertain];

    pub fn is_decisive(&self) -> bool {
        matches!(self, Verdict::True | Verdict::False)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::True => write!(f, "TRUE"),
            Verdict::False => write!(f, "FALSE"),
            Verdict::Uncertain => write!(f, "UNCERTAIN"),
        }
    }
}

/// One provider's judgement attempt. Failures stay on the panel for
/// observability; they never abort aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Judgement {
    Success {
        provider: String,
        verdict: Verdict,
        confidence: f64,
        rationale: String,
    },
    Failure {
        provider: String,
        error: String,
    },
}

impl Judgement {
    pub fn provider(&self) -> &str {
        match self {
            Judgement::Success { provider, .. } | Judgement::Failure { provider, .. } => provider,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Judgement::Success { .. })
    }
}

/// The reconciled outcome of one claim-verification request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub query: String,
    pub verdict: Verdict,
    /// Arithmetic mean of successful confidences, 3-decimal rounding.
    pub score: f64,
    pub explanation: String,
    pub panel: Vec<Judgement>,
}

impl ConsensusResult {
    /// 0–100 integer rendering of the aggregated confidence.
    pub fn trust_score(&self) -> u8 {
        (self.score * 100.0).round().clamp(0.0, 100.0) as u8
    }
}
