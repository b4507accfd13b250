pub mod graph;
pub mod judgement;
pub mod segment;

pub use graph::{ArgumentGraph, GraphEdge, GraphSummary, Relationship};
pub use judgement::{ConsensusResult, Judgement, Verdict};
pub use segment::{ClassifiedSegment, Segment, SentenceType};
