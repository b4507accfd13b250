use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::segment::{ClassifiedSegment, SentenceType};

/// Relationship assigned by the pairwise judge. `None` edges are never
/// materialized into a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    Supports,
    Contradicts,
    Relates,
    None,
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relationship::Supports => write!(f, "supports"),
            Relationship::Contradicts => write!(f, "contradicts"),
            Relationship::Relates => write!(f, "relates"),
            Relationship::None => write!(f, "none"),
        }
    }
}

/// A directed, confidence-scored edge between two classified segments.
/// Direction is judge-assigned; neither symmetry nor transitivity is implied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source_id: String,
    pub target_id: String,
    pub relationship: Relationship,
    pub confidence: f64,
}

/// The argument graph: classified segment nodes plus relationship edges.
/// Every edge endpoint references an existing node id by construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgumentGraph {
    pub nodes: Vec<ClassifiedSegment>,
    pub edges: Vec<GraphEdge>,
}

impl ArgumentGraph {
    /// Node id → classification lookup.
    pub fn node_types(&self) -> HashMap<&str, SentenceType> {
        self.nodes
            .iter()
            .map(|n| (n.id.as_str(), n.classification))
            .collect()
    }

    pub fn claims(&self) -> impl Iterator<Item = &ClassifiedSegment> {
        self.nodes
            .iter()
            .filter(|n| n.classification == SentenceType::Claim)
    }

    pub fn facts(&self) -> impl Iterator<Item = &ClassifiedSegment> {
        self.nodes
            .iter()
            .filter(|n| n.classification == SentenceType::Fact)
    }
}

/// Informational rollup of a built graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSummary {
    pub total_segments: usize,
    pub claims: usize,
    pub facts: usize,
    pub relationships: usize,
    pub relationship_types: HashMap<String, usize>,
    pub avg_confidence: f64,
}

impl GraphSummary {
    pub fn of(graph: &ArgumentGraph) -> Self {
        let mut relationship_types: HashMap<String, usize> = HashMap::new();
        for edge in &graph.edges {
            *relationship_types
                .entry(edge.relationship.to_string())
                .or_insert(0) += 1;
        }

        let avg_confidence = if graph.edges.is_empty() {
            0.0
        } else {
            graph.edges.iter().map(|e| e.confidence).sum::<f64>() / graph.edges.len() as f64
        };

        Self {
            total_segments: graph.nodes.len(),
            claims: graph.claims().count(),
            facts: graph.facts().count(),
            relationships: graph.edges.len(),
            relationship_types,
            avg_confidence,
        }
    }
}
