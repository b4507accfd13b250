//! Verdict normalizer — turns raw judge output into a structured judgement.
//!
//! Judge models are asked for strict JSON but routinely wrap it in code fences
//! or surround it with prose. Extraction strips a leading fence line, slices
//! the first `{` .. last `}` span, and parses that, retrying once after
//! trimming BOM/whitespace. Normalization is lookup-tolerant (lower-cased
//! keys), coerces the verdict into the closed TRUE/FALSE/UNCERTAIN set, and
//! clamps confidence into `[0, 1]`.

use serde_json::Value;
use thiserror::Error;

use crate::models::Verdict;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("no JSON object recoverable from model output: {0}")]
    InvalidJson(String),

    #[error("model JSON is not an object: {0}")]
    NotAnObject(String),
}

/// A judgement after normalization and calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedJudgement {
    pub verdict: Verdict,
    pub confidence: f64,
    pub rationale: String,
}

/// Recover a JSON object from raw model text.
///
/// Handles a leading ``` fence (optionally tagged "json"), stray prose before
/// and after the object, and a BOM. Fails with a structured error when no
/// object is recoverable.
pub fn extract_json_object(raw: &str) -> Result<Value, ParseError> {
    let mut text = raw.trim();

    // Drop the opening fence line; the trailing fence falls outside the
    // brace slice below.
    if text.starts_with("```") {
        text = match text.split_once('\n') {
            Some((_, rest)) => rest,
            None => "",
        };
    }

    let candidate = match (text.find('{'), text.rfind('}')) {
        (Some(a), Some(b)) if b > a => &text[a..=b],
        _ => text,
    };

    let value = match serde_json::from_str::<Value>(candidate) {
        Ok(v) => v,
        Err(_) => {
            let cleaned = candidate.trim_matches(|c: char| c == '\u{feff}' || c.is_whitespace());
            serde_json::from_str::<Value>(cleaned)
                .map_err(|e| ParseError::InvalidJson(e.to_string()))?
        }
    };

    if !value.is_object() {
        return Err(ParseError::NotAnObject(value.to_string()));
    }
    Ok(value)
}

/// Normalize a parsed judgement object into the closed verdict set, then
/// apply the decision-floor calibration.
pub fn normalize_judgement(data: &Value, decision_floor: f64) -> NormalizedJudgement {
    // Case-insensitive key lookup.
    let lookup = |key: &str| -> Option<&Value> {
        data.as_object()?
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    };

    let verdict = match lookup("verdict").and_then(Value::as_str) {
        Some(s) => match s.trim().to_ascii_uppercase().as_str() {
            "TRUE" => Verdict::True,
            "FALSE" => Verdict::False,
            _ => Verdict::Uncertain,
        },
        None => Verdict::Uncertain,
    };

    let confidence = lookup("confidence")
        .and_then(coerce_number)
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    let rationale = match lookup("rationale") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };

    NormalizedJudgement {
        verdict,
        confidence: calibrate_confidence(verdict, confidence, decision_floor),
        rationale,
    }
}

/// A decisive verdict at zero confidence is lifted to the configured floor;
/// UNCERTAIN and any non-zero confidence pass through unchanged.
fn calibrate_confidence(verdict: Verdict, confidence: f64, decision_floor: f64) -> f64 {
    if verdict.is_decisive() && confidence <= 0.0 {
        return decision_floor.clamp(0.0, 1.0);
    }
    confidence
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
