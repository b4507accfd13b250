//! Argument graph builder — windowed pairwise relationship analysis.
//!
//! Nodes come from zipping segments with their classification labels. Edges
//! come from pairwise relationship queries, but only inside a bounded window:
//! for each node i, only positions i+1 .. i+window are considered, and a
//! non-adjacent pair is queried only when the two nodes are differently
//! typed. This is the cost-control policy that keeps judge-call volume far
//! below the full O(n²) comparison.

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use crate::classify::{parse_classification, GeminiCompletionClient};
use crate::config::GraphConfig;
use crate::judges::JudgeError;
use crate::models::{ArgumentGraph, ClassifiedSegment, GraphEdge, Relationship, Segment};
use crate::normalize::ParseError;

// ============================================================================
// RelationshipJudge trait
// ============================================================================

/// Pairwise relationship query against an external judge. Returns free text;
/// extraction into a typed relationship happens in `parse_relationship`.
#[async_trait]
pub trait RelationshipJudge: Send + Sync {
    async fn analyze(
        &self,
        first: &ClassifiedSegment,
        second: &ClassifiedSegment,
    ) -> Result<String, JudgeError>;
}

// ============================================================================
// Relationship extraction
// ============================================================================

fn relationship_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"관계:\s*(supports|contradicts|relates|none)").unwrap())
}

fn confidence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"신뢰도:\s*([0-9.]+)").unwrap())
}

/// Extract `(relationship, confidence)` from free judge text.
///
/// An absent relationship pattern defaults to `None`; an absent confidence
/// pattern defaults to 0.5. A confidence pattern that matches but does not
/// parse as a number is a parse failure, which callers treat the same as a
/// failed judge call.
pub fn parse_relationship(raw: &str) -> Result<(Relationship, f64), ParseError> {
    let relationship = match relationship_re().captures(raw).map(|c| c[1].to_string()) {
        Some(r) => match r.as_str() {
            "supports" => Relationship::Supports,
            "contradicts" => Relationship::Contradicts,
            "relates" => Relationship::Relates,
            _ => Relationship::None,
        },
        None => Relationship::None,
    };

    let confidence = match confidence_re().captures(raw) {
        Some(c) => c[1]
            .parse::<f64>()
            .map_err(|e| ParseError::InvalidJson(format!("confidence `{}`: {}", &c[1], e)))?,
        None => 0.5,
    };

    Ok((relationship, confidence))
}

// ============================================================================
// Graph construction
// ============================================================================

/// Build the argument graph from segments and their index-aligned raw
/// classification labels.
///
/// A failed pairwise call degrades only that pair (relationship none,
/// confidence 0.0); it never aborts construction. Edges are admitted only
/// when the relationship is not `none` and confidence clears the threshold —
/// everything else is silently dropped, never recorded as a zero-confidence
/// edge.
pub async fn build_argument_graph(
    segments: &[Segment],
    labels: &[String],
    judge: &dyn RelationshipJudge,
    config: &GraphConfig,
) -> ArgumentGraph {
    let nodes: Vec<ClassifiedSegment> = segments
        .iter()
        .zip(labels.iter())
        .enumerate()
        .map(|(i, (segment, label))| ClassifiedSegment {
            id: format!("seg_{}", i + 1),
            start: segment.start,
            end: segment.end,
            text: segment.text.clone(),
            classification: parse_classification(label),
        })
        .collect();

    let mut edges = Vec::new();

    for i in 0..nodes.len() {
        for j in (i + 1)..nodes.len().min(i + 1 + config.pairwise_window) {
            let (first, second) = (&nodes[i], &nodes[j]);

            // Mixed-type pairs anywhere in the window; same-type pairs only
            // when adjacent.
            let should_analyze =
                first.classification != second.classification || j == i + 1;
            if !should_analyze {
                continue;
            }

            let (relationship, confidence) = match judge.analyze(first, second).await {
                Ok(raw) => match parse_relationship(&raw) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        tracing::warn!(
                            source = %first.id,
                            target = %second.id,
                            error = %e,
                            "relationship extraction failed"
                        );
                        (Relationship::None, 0.0)
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        source = %first.id,
                        target = %second.id,
                        error = %e,
                        "relationship query failed"
                    );
                    (Relationship::None, 0.0)
                }
            };

            if relationship != Relationship::None && confidence > config.min_edge_confidence {
                edges.push(GraphEdge {
                    source_id: first.id.clone(),
                    target_id: second.id.clone(),
                    relationship,
                    confidence,
                });
            }
        }
    }

    ArgumentGraph { nodes, edges }
}

// ============================================================================
// GeminiRelationshipJudge
// ============================================================================

const RELATIONSHIP_PROMPT: &str = "두 문장 간의 논증 관계를 분석하세요.\n\
     다음 형식으로만 답하세요:\n\
     관계: supports | contradicts | relates | none\n\
     신뢰도: 0.0에서 1.0 사이의 숫자";

/// Relationship judge backed by the shared Gemini completion client.
pub struct GeminiRelationshipJudge {
    inner: GeminiCompletionClient,
}

impl GeminiRelationshipJudge {
    pub fn new(inner: GeminiCompletionClient) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl RelationshipJudge for GeminiRelationshipJudge {
    async fn analyze(
        &self,
        first: &ClassifiedSegment,
        second: &ClassifiedSegment,
    ) -> Result<String, JudgeError> {
        let prompt = format!(
            "{}\n\n문장 1 ({}): {}\n문장 2 ({}): {}",
            RELATIONSHIP_PROMPT,
            first.classification,
            first.text,
            second.classification,
            second.text
        );
        self.inner.generate(prompt).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SentenceType;
    use std::sync::Mutex;

    fn make_segments(n: usize) -> Vec<Segment> {
        (0..n)
            .map(|i| Segment {
                start: i as f64 * 5.0,
                end: i as f64 * 5.0 + 5.0,
                text: format!("segment {}", i + 1),
            })
            .collect()
    }

    /// Judge that records queried pairs and replies with a fixed line.
    struct RecordingJudge {
        reply: String,
        queried: Mutex<Vec<(String, String)>>,
    }

    impl RecordingJudge {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                queried: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RelationshipJudge for RecordingJudge {
        async fn analyze(
            &self,
            first: &ClassifiedSegment,
            second: &ClassifiedSegment,
        ) -> Result<String, JudgeError> {
            self.queried
                .lock()
                .unwrap()
                .push((first.id.clone(), second.id.clone()));
            Ok(self.reply.clone())
        }
    }

    struct FailingJudge;

    #[async_trait]
    impl RelationshipJudge for FailingJudge {
        async fn analyze(
            &self,
            _first: &ClassifiedSegment,
            _second: &ClassifiedSegment,
        ) -> Result<String, JudgeError> {
            Err(JudgeError::EmptyResponse {
                provider: "test".to_string(),
            })
        }
    }

    #[test]
    fn test_parse_relationship_full_line() {
        let (rel, conf) = parse_relationship("관계: supports\n신뢰도: 0.85").unwrap();
        assert_eq!(rel, Relationship::Supports);
        assert!((conf - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_parse_relationship_defaults() {
        // No relationship pattern at all
        let (rel, conf) = parse_relationship("the model rambled").unwrap();
        assert_eq!(rel, Relationship::None);
        assert!((conf - 0.5).abs() < 1e-9);

        // Relationship present, confidence absent
        let (rel, conf) = parse_relationship("관계: contradicts").unwrap();
        assert_eq!(rel, Relationship::Contradicts);
        assert!((conf - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_relationship_malformed_confidence_fails() {
        assert!(parse_relationship("관계: relates\n신뢰도: 1.2.3").is_err());
    }

    #[tokio::test]
    async fn test_node_ids_and_classifications() {
        let segments = make_segments(3);
        let labels = vec!["CLAIM".to_string(), "FACT".to_string(), "hmm".to_string()];
        let judge = RecordingJudge::new("관계: none");

        let graph =
            build_argument_graph(&segments, &labels, &judge, &GraphConfig::default()).await;

        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.nodes[0].id, "seg_1");
        assert_eq!(graph.nodes[2].id, "seg_3");
        assert_eq!(graph.nodes[0].classification, SentenceType::Claim);
        assert_eq!(graph.nodes[1].classification, SentenceType::Fact);
        // Ambiguous label defaults to FACT
        assert_eq!(graph.nodes[2].classification, SentenceType::Fact);
    }

    #[tokio::test]
    async fn test_window_queries_exactly_the_expected_pairs() {
        // Types chosen so every in-window pair qualifies: adjacent pairs
        // always, and each (i, i+2) pair is mixed-type.
        let segments = make_segments(5);
        let labels = ["CLAIM", "CLAIM", "FACT", "FACT", "CLAIM"]
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        let judge = RecordingJudge::new("관계: none");

        build_argument_graph(&segments, &labels, &judge, &GraphConfig::default()).await;

        let queried = judge.queried.lock().unwrap().clone();
        let expected: Vec<(String, String)> =
            [(1, 2), (1, 3), (2, 3), (2, 4), (3, 4), (3, 5), (4, 5)]
                .iter()
                .map(|(a, b)| (format!("seg_{}", a), format!("seg_{}", b)))
                .collect();
        assert_eq!(queried, expected);
    }

    #[tokio::test]
    async fn test_same_type_non_adjacent_pairs_are_skipped() {
        let segments = make_segments(4);
        let labels = vec!["FACT".to_string(); 4];
        let judge = RecordingJudge::new("관계: none");

        build_argument_graph(&segments, &labels, &judge, &GraphConfig::default()).await;

        // All same type: only adjacent pairs are queried.
        let queried = judge.queried.lock().unwrap().clone();
        let expected: Vec<(String, String)> = [(1, 2), (2, 3), (3, 4)]
            .iter()
            .map(|(a, b)| (format!("seg_{}", a), format!("seg_{}", b)))
            .collect();
        assert_eq!(queried, expected);
    }

    #[tokio::test]
    async fn test_edge_admission_threshold() {
        let segments = make_segments(2);
        let labels = vec!["CLAIM".to_string(), "FACT".to_string()];

        // Below threshold: dropped
        let weak = RecordingJudge::new("관계: supports\n신뢰도: 0.2");
        let graph =
            build_argument_graph(&segments, &labels, &weak, &GraphConfig::default()).await;
        assert!(graph.edges.is_empty());

        // Above threshold: admitted
        let strong = RecordingJudge::new("관계: supports\n신뢰도: 0.9");
        let graph =
            build_argument_graph(&segments, &labels, &strong, &GraphConfig::default()).await;
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].source_id, "seg_1");
        assert_eq!(graph.edges[0].target_id, "seg_2");
        assert_eq!(graph.edges[0].relationship, Relationship::Supports);

        // Relationship none: dropped even with high confidence
        let none = RecordingJudge::new("관계: none\n신뢰도: 0.99");
        let graph =
            build_argument_graph(&segments, &labels, &none, &GraphConfig::default()).await;
        assert!(graph.edges.is_empty());
    }

    #[tokio::test]
    async fn test_judge_failure_degrades_pair_not_graph() {
        let segments = make_segments(3);
        let labels = vec![
            "CLAIM".to_string(),
            "FACT".to_string(),
            "CLAIM".to_string(),
        ];

        let graph =
            build_argument_graph(&segments, &labels, &FailingJudge, &GraphConfig::default())
                .await;

        // Nodes survive; no edges, no panic.
        assert_eq!(graph.nodes.len(), 3);
        assert!(graph.edges.is_empty());
    }
}
