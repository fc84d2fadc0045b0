use thiserror::Error;

/// Failure reported by a synthesis engine for a single utterance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("utterance was interrupted")]
    Interrupted,

    #[error("synthesis failed: {0}")]
    Synthesis(String),

    #[error("failed to start synthesizer: {0}")]
    Spawn(String),

    #[error("utterance timed out after {0} ms")]
    Timeout(u64),

    #[error("engine dropped the utterance without reporting an outcome")]
    Disconnected,
}

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Synthesis engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No Tokio runtime available: {0}")]
    Runtime(String),
}
