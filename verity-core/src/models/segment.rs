use serde::{Deserialize, Serialize};

/// A timestamped transcript segment, as produced by transcription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Classification of a transcript segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentenceType {
    Claim,
    Fact,
}

impl std::fmt::Display for SentenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SentenceType::Claim => write!(f, "CLAIM"),
            SentenceType::Fact => write!(f, "FACT"),
        }
    }
}

/// A segment with an assigned classification. `id` is the join key for all
/// downstream edges and result maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedSegment {
    pub id: String,
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub classification: SentenceType,
}
