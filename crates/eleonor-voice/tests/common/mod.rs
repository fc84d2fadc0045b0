#![allow(dead_code)]

use eleonor_types::Voice;
use eleonor_voice::{EngineError, SynthesisEngine, Utterance, UtteranceResult};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, oneshot};

/// A call the service made on the engine, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Cancel,
    Speak(String),
}

/// In-memory engine that records every call and lets tests decide when and
/// how each utterance finishes.
pub struct ScriptedEngine {
    catalog: Mutex<Vec<Voice>>,
    changes: broadcast::Sender<()>,
    calls: Mutex<Vec<EngineCall>>,
    utterances: Mutex<Vec<Utterance>>,
    pending: Mutex<Vec<(String, oneshot::Sender<UtteranceResult>)>>,
    // Cancelled senders a silent engine keeps alive without answering.
    orphaned: Mutex<Vec<oneshot::Sender<UtteranceResult>>>,
    report_interruptions: bool,
}

impl ScriptedEngine {
    /// An engine that reports `EngineError::Interrupted` for cancelled
    /// utterances, like a browser speech engine does.
    pub fn new(catalog: Vec<Voice>) -> Arc<Self> {
        Self::build(catalog, true)
    }

    /// An engine that never reports an outcome for cancelled utterances.
    pub fn silent_on_cancel(catalog: Vec<Voice>) -> Arc<Self> {
        Self::build(catalog, false)
    }

    fn build(catalog: Vec<Voice>, report_interruptions: bool) -> Arc<Self> {
        let (changes, _) = broadcast::channel(4);
        Arc::new(Self {
            catalog: Mutex::new(catalog),
            changes,
            calls: Mutex::new(Vec::new()),
            utterances: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            orphaned: Mutex::new(Vec::new()),
            report_interruptions,
        })
    }

    /// Replaces the catalog and fires the "voices changed" notification.
    pub fn populate(&self, catalog: Vec<Voice>) {
        *self.catalog.lock().unwrap() = catalog;
        let _ = self.changes.send(());
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == EngineCall::Cancel)
            .count()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.utterances
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    pub fn last_utterance(&self) -> Option<Utterance> {
        self.utterances.lock().unwrap().last().cloned()
    }

    /// Number of live "voices changed" subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Finishes the pending utterance for `text` successfully.
    pub fn finish(&self, text: &str) -> bool {
        self.settle(text, Ok(()))
    }

    /// Fails the pending utterance for `text` with `error`.
    pub fn fail(&self, text: &str, error: EngineError) -> bool {
        self.settle(text, Err(error))
    }

    /// Drops the completion sender for `text` without reporting anything.
    pub fn abandon(&self, text: &str) -> bool {
        let mut pending = self.pending.lock().unwrap();
        match pending.iter().position(|(t, _)| t == text) {
            Some(index) => {
                pending.remove(index);
                true
            }
            None => false,
        }
    }

    fn settle(&self, text: &str, result: UtteranceResult) -> bool {
        let mut pending = self.pending.lock().unwrap();
        match pending.iter().position(|(t, _)| t == text) {
            Some(index) => {
                let (_, done) = pending.remove(index);
                done.send(result).is_ok()
            }
            None => false,
        }
    }
}

impl SynthesisEngine for ScriptedEngine {
    fn voices(&self) -> Vec<Voice> {
        self.catalog.lock().unwrap().clone()
    }

    fn subscribe_voices_changed(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }

    fn speak(&self, utterance: Utterance) -> oneshot::Receiver<UtteranceResult> {
        let (done, outcome) = oneshot::channel();
        self.calls
            .lock()
            .unwrap()
            .push(EngineCall::Speak(utterance.text.clone()));
        self.pending
            .lock()
            .unwrap()
            .push((utterance.text.clone(), done));
        self.utterances.lock().unwrap().push(utterance);
        outcome
    }

    fn cancel(&self) {
        self.calls.lock().unwrap().push(EngineCall::Cancel);
        let cancelled: Vec<_> = self.pending.lock().unwrap().drain(..).collect();
        for (_, done) in cancelled {
            if self.report_interruptions {
                let _ = done.send(Err(EngineError::Interrupted));
            } else {
                self.orphaned.lock().unwrap().push(done);
            }
        }
    }
}

/// Engine whose catalog is never reported as loaded and whose notification
/// channel is already closed when the service subscribes.
pub struct ClosedEngine {
    catalog: Vec<Voice>,
}

impl ClosedEngine {
    pub fn new(catalog: Vec<Voice>) -> Arc<Self> {
        Arc::new(Self { catalog })
    }
}

impl SynthesisEngine for ClosedEngine {
    fn voices(&self) -> Vec<Voice> {
        self.catalog.clone()
    }

    fn voices_loaded(&self) -> bool {
        false
    }

    fn subscribe_voices_changed(&self) -> broadcast::Receiver<()> {
        let (changes, receiver) = broadcast::channel(1);
        drop(changes);
        receiver
    }

    fn speak(&self, _utterance: Utterance) -> oneshot::Receiver<UtteranceResult> {
        let (done, outcome) = oneshot::channel();
        let _ = done.send(Ok(()));
        outcome
    }

    fn cancel(&self) {}
}

pub fn spanish_catalog() -> Vec<Voice> {
    vec![
        Voice::new("Paulina", "es-MX"),
        Voice::new("Helena (female)", "es-ES"),
        Voice::new("Alex", "en-US").with_default(true),
    ]
}

/// Yields to the runtime until `condition` holds, panicking after a bound.
pub async fn settle_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
