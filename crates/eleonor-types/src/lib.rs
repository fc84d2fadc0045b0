//! Shared types for the Eleonor assistant voice output.
//!
//! This crate holds the plain value types exchanged between the voice
//! service, the synthesis engines and the front-ends that drive them:
//! catalog entries (`Voice`), per-request acoustic overrides
//! (`SpeechOptions`) and their resolved form (`SpeechParams`), plus the
//! service readiness state.
//!
//! It carries no runtime dependencies beyond `serde`, so any crate in the
//! workspace can depend on it without pulling in `tokio`.

use serde::{Deserialize, Serialize};

pub mod voice;

pub use voice::{SpeechOptions, SpeechParams, Voice};

/// Voice discovery state of the output service.
///
/// Moves from `Uninitialized` to `Ready` exactly once, after the voice
/// catalog has been inspected and a voice (possibly none) selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessState {
    /// Voice discovery has not completed yet.
    #[default]
    Uninitialized,
    /// Voice discovery completed.
    Ready,
}

impl ReadinessState {
    /// Returns the lowercase label for this state.
    pub fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
        }
    }

    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl std::fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
