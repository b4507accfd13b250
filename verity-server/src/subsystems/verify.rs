//! Verify subsystem — per-node consensus over an argument graph.
//!
//! Each node's text goes through the full judge panel; the panel's internal
//! fan-out is the concurrency unit, so nodes are verified one after another
//! to keep provider load bounded.

use serde::Serialize;
use std::collections::BTreeMap;

use verity_core::consensus::{ConsensusError, JudgePanel};
use verity_core::models::{ArgumentGraph, SentenceType};

/// One node's verification entry in the result map, shaped for the
/// downstream real-time channel.
#[derive(Debug, Clone, Serialize)]
pub struct NodeVerification {
    #[serde(rename = "trustScore")]
    pub trust_score: u8,
    pub id: String,
    pub reasoning: String,
    pub references: Vec<String>,
}

/// Verify every node of the graph and key the results `claim_<n>` /
/// `fact_<n>`, numbered per type in node order.
pub async fn verify_graph(
    panel: &JudgePanel,
    graph: &ArgumentGraph,
) -> Result<BTreeMap<String, NodeVerification>, ConsensusError> {
    if panel.is_empty() {
        return Err(ConsensusError::NoProviders);
    }
    // A blank node invalidates the whole request; reject it before spending
    // any provider calls on the other nodes.
    if graph.nodes.iter().any(|n| n.text.trim().is_empty()) {
        return Err(ConsensusError::EmptyClaim);
    }

    let mut result = BTreeMap::new();
    let mut claim_count = 0usize;
    let mut fact_count = 0usize;

    for node in &graph.nodes {
        let key = match node.classification {
            SentenceType::Claim => {
                claim_count += 1;
                format!("claim_{}", claim_count)
            }
            SentenceType::Fact => {
                fact_count += 1;
                format!("fact_{}", fact_count)
            }
        };

        let consensus = panel.verify_claim(&node.text).await?;
        tracing::debug!(
            node = %node.id,
            verdict = %consensus.verdict,
            score = consensus.score,
            "node verified"
        );

        result.insert(
            key,
            NodeVerification {
                trust_score: consensus.trust_score(),
                id: node.id.clone(),
                reasoning: format!("{}: {}", consensus.verdict, consensus.explanation),
                references: Vec::new(),
            },
        );
    }

    Ok(result)
}

// ============================================================================
// TESTS
// ============================================================================
