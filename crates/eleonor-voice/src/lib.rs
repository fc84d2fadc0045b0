//! Voice output for the Eleonor virtual assistant.
//!
//! Converts assistant text replies into speech. The crate separates the
//! service that the chat front-end talks to from the engine that actually
//! produces audio:
//!
//! - `VoiceOutputService` discovers the engine's voices once, picks the best
//!   fit for the assistant persona, and plays one reply at a time. A new
//!   reply always interrupts the one currently playing.
//! - `SynthesisEngine` is the seam to the platform synthesizer.
//!   `EspeakEngine` implements it on top of the `espeak-ng` binary.
//!
//! Every `speak` call settles through its returned future: completion,
//! interruption and "not ready" are reported as a `SpeechOutcome`, engine
//! failures as `VoiceError::Engine`.

pub mod config;
pub mod engine;
pub mod error;
pub mod espeak;
pub mod selection;
pub mod service;

pub use config::{EspeakConfig, VoiceConfig};
pub use engine::{SynthesisEngine, Utterance, UtteranceResult};
pub use error::{EngineError, VoiceError};
pub use espeak::EspeakEngine;
pub use selection::SelectionPolicy;
pub use service::{SpeechOutcome, VoiceOutputService};
