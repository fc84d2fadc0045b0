//! The seam between the voice service and a platform synthesizer.

use crate::error::EngineError;
use eleonor_types::{SpeechParams, Voice};
use tokio::sync::{broadcast, oneshot};

/// Outcome an engine reports for one utterance.
pub type UtteranceResult = Result<(), EngineError>;

/// A single request to speak `text` with a given voice and parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: Voice,
    pub params: SpeechParams,
}

/// A text-to-speech engine able to play utterances.
///
/// Implementations own the audio device. `VoiceOutputService` is the only
/// caller and serializes every `speak`/`cancel` call, so engines do not need
/// to arbitrate between concurrent submitters themselves.
pub trait SynthesisEngine: Send + Sync {
    /// Returns the current voice catalog. May be empty while the engine is
    /// still discovering voices.
    fn voices(&self) -> Vec<Voice>;

    /// Returns true once voice discovery has finished, even if it found no
    /// voices. Engines that may legitimately end up with an empty catalog
    /// should override this so late subscribers do not wait forever.
    fn voices_loaded(&self) -> bool {
        !self.voices().is_empty()
    }

    /// Subscribes to "catalog changed" notifications.
    fn subscribe_voices_changed(&self) -> broadcast::Receiver<()>;

    /// Starts playing `utterance`.
    ///
    /// The returned receiver settles once: `Ok(())` when playback finished,
    /// or the error the engine hit. Dropping the sender without a value is
    /// treated as `EngineError::Disconnected`.
    fn speak(&self, utterance: Utterance) -> oneshot::Receiver<UtteranceResult>;

    /// Cancels every in-flight and queued utterance. Must be a no-op when
    /// nothing is playing.
    fn cancel(&self);
}
