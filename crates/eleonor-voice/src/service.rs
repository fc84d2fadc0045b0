//! Assistant voice output.
//!
//! `VoiceOutputService` turns assistant replies into speech on a shared
//! synthesis engine. It selects one voice when the engine's catalog first
//! becomes available and keeps at most one utterance playing: every new
//! `speak` interrupts the previous one instead of queueing behind it.

use crate::config::VoiceConfig;
use crate::engine::{SynthesisEngine, Utterance, UtteranceResult};
use crate::error::{EngineError, VoiceError};
use crate::selection::SelectionPolicy;
use eleonor_types::{ReadinessState, SpeechOptions, SpeechParams, Voice};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{debug, info, warn};

/// How a `speak` request settled when the engine did not report an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// The engine played the whole utterance.
    Completed,
    /// Voice discovery has not finished, or finished without a usable voice.
    /// Nothing was sent to the engine.
    NotReady,
    /// The text was empty or whitespace. Nothing was sent to the engine.
    EmptyText,
    /// A later `speak` call interrupted this utterance.
    Superseded,
    /// `stop` interrupted this utterance.
    Stopped,
}

impl SpeechOutcome {
    /// Returns true if the engine actually finished speaking the text.
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interruption {
    Superseded,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
enum Discovery {
    Pending,
    Complete(Option<Voice>),
}

struct ActivePlayback {
    id: u64,
    interrupt: oneshot::Sender<Interruption>,
}

#[derive(Default)]
struct PlaybackSlot {
    next_id: u64,
    active: Option<ActivePlayback>,
}

struct Inner {
    engine: Option<Arc<dyn SynthesisEngine>>,
    policy: SelectionPolicy,
    defaults: SpeechParams,
    discovery: watch::Sender<Discovery>,
    speaking: watch::Sender<bool>,
    // Every engine call from speak/stop happens while this lock is held.
    slot: Mutex<PlaybackSlot>,
}

/// Speaks assistant replies with a single automatically selected voice.
///
/// Cloning is cheap and every clone drives the same engine and playback
/// slot, so the chat front-end and the avatar can each hold one.
#[derive(Clone)]
pub struct VoiceOutputService {
    inner: Arc<Inner>,
}

impl VoiceOutputService {
    /// Creates a service on `engine` and starts voice discovery.
    ///
    /// When the engine already exposes voices, selection happens before this
    /// returns. Otherwise a background task waits for the engine's
    /// "voices changed" notification, which needs a Tokio runtime; without
    /// one this returns `VoiceError::Runtime`.
    pub fn new(
        engine: Arc<dyn SynthesisEngine>,
        config: &VoiceConfig,
    ) -> Result<Self, VoiceError> {
        config.validate()?;
        let service = Self::build(Some(Arc::clone(&engine)), config);
        service.start_discovery(engine.as_ref(), config.discovery_timeout())?;
        Ok(service)
    }

    /// Creates a service for an environment without a synthesis engine.
    ///
    /// It never becomes ready, and every `speak` settles as
    /// `SpeechOutcome::NotReady`.
    pub fn disabled() -> Self {
        Self::build(None, &VoiceConfig::default())
    }

    fn build(engine: Option<Arc<dyn SynthesisEngine>>, config: &VoiceConfig) -> Self {
        let (discovery, _) = watch::channel(Discovery::Pending);
        let (speaking, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                engine,
                policy: SelectionPolicy::from(config),
                defaults: config.speech_defaults(),
                discovery,
                speaking,
                slot: Mutex::new(PlaybackSlot::default()),
            }),
        }
    }

    fn start_discovery(
        &self,
        engine: &dyn SynthesisEngine,
        limit: Option<Duration>,
    ) -> Result<(), VoiceError> {
        // Subscribe before reading the catalog so a population racing with
        // construction still wakes the waiter.
        let mut changes = engine.subscribe_voices_changed();
        if engine.voices_loaded() {
            self.inner.complete_discovery(&engine.voices());
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|e| VoiceError::Runtime(e.to_string()))?;
        debug!("voice catalog is empty, waiting for the engine to populate it");
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        // Only this task completes discovery, so the state can only change
        // early by its sender going away with the last service handle.
        let mut released = self.inner.discovery.subscribe();
        runtime.spawn(async move {
            tokio::select! {
                () = wait_for_catalog(&mut changes, limit) => {}
                _ = released.changed() => {
                    debug!("voice service dropped before its catalog arrived");
                    return;
                }
            }
            drop(changes);

            if let Some(inner) = inner.upgrade() {
                let catalog = inner
                    .engine
                    .as_ref()
                    .map(|engine| engine.voices())
                    .unwrap_or_default();
                inner.complete_discovery(&catalog);
            }
        });
        Ok(())
    }

    /// Returns the current discovery state.
    pub fn readiness(&self) -> ReadinessState {
        match *self.inner.discovery.borrow() {
            Discovery::Pending => ReadinessState::Uninitialized,
            Discovery::Complete(_) => ReadinessState::Ready,
        }
    }

    /// Returns the voice chosen during discovery, if any.
    pub fn selected_voice(&self) -> Option<Voice> {
        match &*self.inner.discovery.borrow() {
            Discovery::Complete(voice) => voice.clone(),
            Discovery::Pending => None,
        }
    }

    /// Waits until voice discovery has completed.
    ///
    /// Never returns for a `disabled` service; callers that cannot wait
    /// indefinitely should wrap it in `tokio::time::timeout`.
    pub async fn wait_until_ready(&self) -> ReadinessState {
        let mut discovery = self.inner.discovery.subscribe();
        // The sender lives in `self.inner`, so the channel cannot close here.
        let _ = discovery
            .wait_for(|state| matches!(state, Discovery::Complete(_)))
            .await;
        self.readiness()
    }

    /// Speaks `text`, interrupting whatever is currently playing.
    ///
    /// Settles with `Ok(SpeechOutcome::Completed)` once the engine finished,
    /// with another `SpeechOutcome` when the request was skipped or
    /// interrupted, and with `Err(VoiceError::Engine)` carrying the engine's
    /// own error when playback failed. Failures are not retried.
    ///
    /// Dropping the returned future while its utterance is still playing
    /// cancels the utterance.
    pub async fn speak(
        &self,
        text: &str,
        options: SpeechOptions,
    ) -> Result<SpeechOutcome, VoiceError> {
        let (engine, voice) = match (&self.inner.engine, self.selected_voice()) {
            (Some(engine), Some(voice)) => (engine, voice),
            _ => {
                warn!(
                    readiness = %self.readiness(),
                    "speech requested before a voice is available, dropping it"
                );
                return Ok(SpeechOutcome::NotReady);
            }
        };

        if text.trim().is_empty() {
            debug!("ignoring empty speech request");
            return Ok(SpeechOutcome::EmptyText);
        }

        let utterance = Utterance {
            text: text.to_string(),
            voice,
            params: self.inner.defaults.resolve(&options),
        };
        let (id, completion, interrupted) = self.inner.begin(engine.as_ref(), utterance);
        let mut guard = PlaybackGuard {
            inner: &self.inner,
            id,
            settled: false,
        };

        let outcome = tokio::select! {
            biased;
            reason = interrupted => match reason {
                Ok(Interruption::Superseded) => Ok(SpeechOutcome::Superseded),
                Ok(Interruption::Stopped) | Err(_) => Ok(SpeechOutcome::Stopped),
            },
            result = completion => match result {
                Ok(Ok(())) => Ok(SpeechOutcome::Completed),
                Ok(Err(error)) => Err(VoiceError::Engine(error)),
                Err(_) => Err(VoiceError::Engine(EngineError::Disconnected)),
            },
        };
        guard.settled = true;

        match &outcome {
            Ok(settled) => debug!(playback = id, outcome = ?settled, "playback settled"),
            Err(error) => warn!(playback = id, error = %error, "playback failed"),
        }
        outcome
    }

    /// Halts the active playback, if any.
    ///
    /// Safe to call at any time. Readiness and the selected voice are left
    /// untouched.
    pub fn stop(&self) {
        let Some(engine) = &self.inner.engine else {
            return;
        };
        let mut slot = self.inner.lock_slot();
        if let Some(active) = slot.active.take() {
            debug!(playback = active.id, "stopping active playback");
            let _ = active.interrupt.send(Interruption::Stopped);
        }
        engine.cancel();
        self.inner.speaking.send_replace(false);
    }

    /// Returns the catalog voices in the target language, in catalog order.
    ///
    /// Empty until discovery has completed.
    pub fn available_voices(&self) -> Vec<Voice> {
        match (&self.inner.engine, self.readiness()) {
            (Some(engine), ReadinessState::Ready) => self.inner.policy.matching(&engine.voices()),
            _ => Vec::new(),
        }
    }

    /// Returns true while an utterance is playing.
    pub fn is_speaking(&self) -> bool {
        *self.inner.speaking.borrow()
    }

    /// Subscribes to the "is speaking" flag, e.g. to animate an avatar.
    pub fn subscribe_speaking(&self) -> watch::Receiver<bool> {
        self.inner.speaking.subscribe()
    }
}

impl fmt::Debug for VoiceOutputService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceOutputService")
            .field("has_engine", &self.inner.engine.is_some())
            .field("readiness", &self.readiness())
            .field("selected_voice", &self.selected_voice())
            .field("speaking", &self.is_speaking())
            .finish()
    }
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, PlaybackSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete_discovery(&self, catalog: &[Voice]) {
        let selected = self.policy.select(catalog).cloned();
        let completed = self.discovery.send_if_modified(|state| {
            if *state == Discovery::Pending {
                *state = Discovery::Complete(selected.clone());
                true
            } else {
                false
            }
        });
        if !completed {
            return;
        }

        match &selected {
            Some(voice) => info!(
                voice = %voice.name,
                language = %voice.language_tag,
                catalog_size = catalog.len(),
                "selected assistant voice"
            ),
            None => warn!(
                catalog_size = catalog.len(),
                "voice discovery finished without a usable voice"
            ),
        }
    }

    /// Supersedes the active playback and submits `utterance` in its place.
    fn begin(
        &self,
        engine: &dyn SynthesisEngine,
        utterance: Utterance,
    ) -> (
        u64,
        oneshot::Receiver<UtteranceResult>,
        oneshot::Receiver<Interruption>,
    ) {
        let mut slot = self.lock_slot();
        if let Some(previous) = slot.active.take() {
            debug!(playback = previous.id, "superseding active playback");
            let _ = previous.interrupt.send(Interruption::Superseded);
        }
        engine.cancel();

        slot.next_id += 1;
        let id = slot.next_id;
        debug!(
            playback = id,
            chars = utterance.text.chars().count(),
            voice = %utterance.voice.name,
            rate = utterance.params.rate,
            pitch = utterance.params.pitch,
            volume = utterance.params.volume,
            "submitting utterance"
        );
        let completion = engine.speak(utterance);
        let (interrupt, interrupted) = oneshot::channel();
        slot.active = Some(ActivePlayback { id, interrupt });
        self.speaking.send_replace(true);

        (id, completion, interrupted)
    }
}

/// Clears the playback slot when a `speak` future finishes or is dropped.
struct PlaybackGuard<'a> {
    inner: &'a Inner,
    id: u64,
    settled: bool,
}

impl Drop for PlaybackGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.inner.lock_slot();
        if slot.active.as_ref().is_some_and(|active| active.id == self.id) {
            slot.active = None;
            if !self.settled {
                if let Some(engine) = &self.inner.engine {
                    debug!(playback = self.id, "speak future dropped, cancelling playback");
                    engine.cancel();
                }
            }
            self.inner.speaking.send_replace(false);
        }
    }
}

async fn wait_for_catalog(changes: &mut broadcast::Receiver<()>, limit: Option<Duration>) {
    match limit {
        Some(limit) => {
            if tokio::time::timeout(limit, next_change(changes)).await.is_err() {
                warn!(
                    timeout_ms = limit.as_millis() as u64,
                    "voice catalog notification timed out"
                );
            }
        }
        None => next_change(changes).await,
    }
}

async fn next_change(changes: &mut broadcast::Receiver<()>) {
    match changes.recv().await {
        Ok(()) | Err(RecvError::Lagged(_)) => {}
        Err(RecvError::Closed) => {
            debug!("engine closed voice notifications before populating the catalog")
        }
    }
}
