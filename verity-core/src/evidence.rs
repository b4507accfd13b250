//! Claim-evidence mapper — derives claim → supporting-fact lists from a graph.
//!
//! Pure functions over a built `ArgumentGraph`; no external calls, fully
//! deterministic for a fixed graph. Only `supports` and `relates` edges
//! between differently-typed nodes count as evidence; `contradicts` stays in
//! the graph but never enters the support mapping.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::models::{ArgumentGraph, Relationship, SentenceType};

/// Rollup of the claim-evidence structure of one graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimEvidenceSummary {
    pub total_claims: usize,
    pub total_facts: usize,
    pub supported_claims: usize,
    pub unsupported_claims: usize,
    pub used_evidences: usize,
    pub unused_evidences: usize,
    pub claim_evidence_pairs: usize,
    pub claim_evidence_mapping: BTreeMap<String, Vec<String>>,
}

/// Claim id → ordered fact ids that support (or relate to) it.
///
/// The usual direction is FACT source → CLAIM target. The reverse typing
/// (CLAIM source → FACT target) is treated as a reversed-evidence case and
/// recorded under the claim, not discarded.
pub fn claim_evidence_mapping(graph: &ArgumentGraph) -> BTreeMap<String, Vec<String>> {
    let node_types = graph.node_types();
    let mut mapping: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for edge in &graph.edges {
        if !matches!(
            edge.relationship,
            Relationship::Supports | Relationship::Relates
        ) {
            continue;
        }

        let source_type = node_types.get(edge.source_id.as_str()).copied();
        let target_type = node_types.get(edge.target_id.as_str()).copied();

        match (source_type, target_type) {
            (Some(SentenceType::Fact), Some(SentenceType::Claim)) => {
                mapping
                    .entry(edge.target_id.clone())
                    .or_default()
                    .push(edge.source_id.clone());
            }
            (Some(SentenceType::Claim), Some(SentenceType::Fact)) => {
                mapping
                    .entry(edge.source_id.clone())
                    .or_default()
                    .push(edge.target_id.clone());
            }
            // Same-typed pairs carry no evidence.
            _ => {}
        }
    }

    mapping
}

pub fn claim_evidence_summary(graph: &ArgumentGraph) -> ClaimEvidenceSummary {
    let mapping = claim_evidence_mapping(graph);

    let total_claims = graph.claims().count();
    let total_facts = graph.facts().count();

    let supported_claims = mapping.values().filter(|v| !v.is_empty()).count();
    let used_evidences = mapping
        .values()
        .flatten()
        .collect::<HashSet<_>>()
        .len();
    let claim_evidence_pairs = mapping.values().map(Vec::len).sum();

    ClaimEvidenceSummary {
        total_claims,
        total_facts,
        supported_claims,
        unsupported_claims: total_claims - supported_claims,
        used_evidences,
        unused_evidences: total_facts - used_evidences,
        claim_evidence_pairs,
        claim_evidence_mapping: mapping,
    }
}

impl ClaimEvidenceSummary {
    /// Human-readable rendering for CLI output and explanations.
    pub fn render(&self, graph: &ArgumentGraph) -> String {
        let texts: BTreeMap<&str, &str> = graph
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n.text.as_str()))
            .collect();

        let mut out = Vec::new();
        for (claim_id, evidence_ids) in &self.claim_evidence_mapping {
            out.push(format!(
                "claim ({}): {}",
                claim_id,
                texts.get(claim_id.as_str()).unwrap_or(&"unknown")
            ));
            for evidence_id in evidence_ids {
                out.push(format!(
                    "  - ({}): {}",
                    evidence_id,
                    texts.get(evidence_id.as_str()).unwrap_or(&"unknown")
                ));
            }
        }

        let unsupported: Vec<&str> = graph
            .claims()
            .filter(|c| !self.claim_evidence_mapping.contains_key(&c.id))
            .map(|c| c.id.as_str())
            .collect();
        if !unsupported.is_empty() {
            out.push(format!("unsupported claims: {}", unsupported.join(", ")));
        }

        out.join("\n")
    }
}

// ============================================================================
// TESTS
// ============================================================================
