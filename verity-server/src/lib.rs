//! Verity server — HTTP API, delivery channel, and analysis subsystems.

pub mod delivery;
pub mod http;
pub mod subsystems;
pub mod transcription;
