//! Extract subsystem — classification fan-out plus graph construction.
//!
//! Classification calls are independent, so they are dispatched concurrently
//! across all segments. Pairwise relationship queries run sequentially per
//! window pair inside the graph builder.

use std::sync::Arc;

use verity_core::classify::ClassifierBackend;
use verity_core::config::GraphConfig;
use verity_core::evidence::{claim_evidence_summary, ClaimEvidenceSummary};
use verity_core::graph::{build_argument_graph, RelationshipJudge};
use verity_core::models::{ArgumentGraph, GraphSummary, Segment};

pub struct ExtractResult {
    pub argument_graph: ArgumentGraph,
    pub summary: GraphSummary,
    pub claim_evidence: ClaimEvidenceSummary,
}

pub struct ExtractPipeline {
    classifier: Arc<dyn ClassifierBackend>,
    relationship_judge: Arc<dyn RelationshipJudge>,
    graph_config: GraphConfig,
}

impl ExtractPipeline {
    pub fn new(
        classifier: Arc<dyn ClassifierBackend>,
        relationship_judge: Arc<dyn RelationshipJudge>,
        graph_config: GraphConfig,
    ) -> Self {
        Self {
            classifier,
            relationship_judge,
            graph_config,
        }
    }

    pub async fn extract(&self, segments: &[Segment]) -> ExtractResult {
        let labels = self.classify_all(segments).await;

        let argument_graph = build_argument_graph(
            segments,
            &labels,
            self.relationship_judge.as_ref(),
            &self.graph_config,
        )
        .await;

        let summary = GraphSummary::of(&argument_graph);
        let claim_evidence = claim_evidence_summary(&argument_graph);

        tracing::info!(
            segments = argument_graph.nodes.len(),
            edges = argument_graph.edges.len(),
            claims = summary.claims,
            facts = summary.facts,
            "argument graph built"
        );

        ExtractResult {
            argument_graph,
            summary,
            claim_evidence,
        }
    }

    /// One classification task per segment, joined together; results stay
    /// index-aligned with the input.
    async fn classify_all(&self, segments: &[Segment]) -> Vec<String> {
        let tasks: Vec<_> = segments
            .iter()
            .map(|segment| {
                let classifier = Arc::clone(&self.classifier);
                let text = segment.text.clone();
                tokio::spawn(async move { classifier.classify(&text).await })
            })
            .collect();

        // Classifier calls are infallible by contract; a panicked task
        // degrades to the default-to-FACT rule like any other failure.
        futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "classification task failed");
                    verity_core::classify::CLASSIFICATION_FAILED.to_string()
                })
            })
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use verity_core::judges::JudgeError;
    use verity_core::models::{ClassifiedSegment, SentenceType};

    /// Alternates CLAIM / FACT by text marker.
    struct MarkerClassifier;

    #[async_trait]
    impl ClassifierBackend for MarkerClassifier {
        async fn classify(&self, text: &str) -> String {
            if text.contains('!') {
                "CLAIM".to_string()
            } else {
                "FACT".to_string()
            }
        }
    }

    struct SupportsJudge;

    #[async_trait]
    impl RelationshipJudge for SupportsJudge {
        async fn analyze(
            &self,
            _first: &ClassifiedSegment,
            _second: &ClassifiedSegment,
        ) -> Result<String, JudgeError> {
            Ok("관계: supports\n신뢰도: 0.9".to_string())
        }
    }

    fn segment(text: &str, start: f64) -> Segment {
        Segment {
            start,
            end: start + 5.0,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_extract_builds_graph_and_summaries() {
        let pipeline = ExtractPipeline::new(
            Arc::new(MarkerClassifier),
            Arc::new(SupportsJudge),
            GraphConfig::default(),
        );

        let segments = vec![
            segment("vaccines cause autism!", 0.0),
            segment("a 2019 cohort study found no association", 5.0),
            segment("the study followed 650000 children", 10.0),
        ];

        let result = pipeline.extract(&segments).await;

        assert_eq!(result.argument_graph.nodes.len(), 3);
        assert_eq!(
            result.argument_graph.nodes[0].classification,
            SentenceType::Claim
        );
        assert_eq!(result.summary.claims, 1);
        assert_eq!(result.summary.facts, 2);
        assert!(!result.argument_graph.edges.is_empty());
        // seg_1 is the claim; the supporting facts land in its evidence list.
        assert!(result
            .claim_evidence
            .claim_evidence_mapping
            .contains_key("seg_1"));
    }

    #[tokio::test]
    async fn test_extract_empty_input() {
        let pipeline = ExtractPipeline::new(
            Arc::new(MarkerClassifier),
            Arc::new(SupportsJudge),
            GraphConfig::default(),
        );

        let result = pipeline.extract(&[]).await;
        assert!(result.argument_graph.nodes.is_empty());
        assert!(result.argument_graph.edges.is_empty());
        assert_eq!(result.summary.total_segments, 0);
    }
}
