pub mod classify;
pub mod config;
pub mod consensus;
pub mod evidence;
pub mod graph;
pub mod judges;
pub mod models;
pub mod normalize;

pub use config::VerityConfig;
pub use consensus::{ConsensusError, JudgePanel};
pub use judges::{GeminiJudge, GroqJudge, JudgeBackend, JudgeError, ModelFallback, OpenAiCompatJudge};
pub use models::{ArgumentGraph, ClassifiedSegment, ConsensusResult, Judgement, Segment, Verdict};
