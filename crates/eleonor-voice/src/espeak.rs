//! `espeak-ng` synthesis engine.
//!
//! Speaks utterances by running the `espeak-ng` command-line synthesizer,
//! which plays straight to the default audio device. The voice catalog is
//! read from `espeak-ng --voices` in the background after construction, and
//! subscribers are notified once it is available.
//!
//! Acoustic parameters are mapped onto the synthesizer's flags:
//! - rate:   words per minute, `175 * rate`, clamped to 80..=450
//! - pitch:  `50 * pitch`, clamped to 0..=99
//! - volume: amplitude, `100 * volume`, clamped to 0..=200

use crate::config::EspeakConfig;
use crate::engine::{SynthesisEngine, Utterance, UtteranceResult};
use crate::error::EngineError;
use eleonor_types::Voice;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, Command};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Maximum text input size for a single utterance (64 KiB).
const MAX_UTTERANCE_BYTES: usize = 64 * 1024;

/// espeak-ng's own default speed, in words per minute.
const BASE_WPM: f32 = 175.0;

/// Language of the voice espeak-ng falls back to when none is given.
const DEFAULT_LANGUAGE: &str = "en";

type KillSwitches = Arc<Mutex<HashMap<u64, oneshot::Sender<()>>>>;

/// Synthesis engine backed by the `espeak-ng` binary.
#[derive(Debug)]
pub struct EspeakEngine {
    binary: PathBuf,
    utterance_timeout: Duration,
    catalog: RwLock<Vec<Voice>>,
    loaded: AtomicBool,
    changes: broadcast::Sender<()>,
    running: KillSwitches,
    next_id: AtomicU64,
}

impl EspeakEngine {
    /// Locates the synthesizer binary and starts the engine.
    ///
    /// Returns `None` when no binary is configured or found on `PATH`.
    pub fn detect(config: &EspeakConfig) -> Option<Arc<Self>> {
        let binary = resolve_binary(config)?;
        info!(bin = ?binary, "detected espeak-ng binary");
        match Self::spawn(&binary, config) {
            Ok(engine) => Some(engine),
            Err(e) => {
                warn!(bin = ?binary, error = %e, "cannot start espeak-ng engine");
                None
            }
        }
    }

    /// Starts the engine on `binary` and begins listing its voices.
    ///
    /// The listing runs on the current Tokio runtime; without one this
    /// returns `EngineError::Spawn`.
    pub fn spawn(
        binary: impl AsRef<Path>,
        config: &EspeakConfig,
    ) -> Result<Arc<Self>, EngineError> {
        let runtime = Handle::try_current()
            .map_err(|e| EngineError::Spawn(format!("no Tokio runtime: {}", e)))?;
        let (changes, _) = broadcast::channel(4);
        let engine = Arc::new(Self {
            binary: binary.as_ref().to_path_buf(),
            utterance_timeout: config.utterance_timeout(),
            catalog: RwLock::new(Vec::new()),
            loaded: AtomicBool::new(false),
            changes,
            running: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        });

        let binary = engine.binary.clone();
        let weak = Arc::downgrade(&engine);
        runtime.spawn(async move {
            let listing = list_voices(&binary).await;
            if let Some(engine) = weak.upgrade() {
                engine.populate(listing);
            }
        });

        Ok(engine)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn populate(&self, listing: Result<Vec<Voice>, EngineError>) {
        let voices = match listing {
            Ok(voices) => voices,
            Err(e) => {
                warn!(error = %e, "failed to list espeak-ng voices");
                Vec::new()
            }
        };
        info!(count = voices.len(), "espeak-ng voice catalog loaded");
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = voices;
        self.loaded.store(true, Ordering::Release);
        // No subscribers is fine: the catalog is read on demand.
        let _ = self.changes.send(());
    }

    fn lock_running(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<()>>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SynthesisEngine for EspeakEngine {
    fn voices(&self) -> Vec<Voice> {
        self.catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn voices_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    fn subscribe_voices_changed(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }

    fn speak(&self, utterance: Utterance) -> oneshot::Receiver<UtteranceResult> {
        let (done, outcome) = oneshot::channel();

        if utterance.text.len() > MAX_UTTERANCE_BYTES {
            let _ = done.send(Err(EngineError::Synthesis(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                utterance.text.len(),
                MAX_UTTERANCE_BYTES
            ))));
            return outcome;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (kill, killed) = oneshot::channel();
        self.lock_running().insert(id, kill);

        let binary = self.binary.clone();
        let args = utterance_args(&utterance);
        let limit = self.utterance_timeout;
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            let result = run_utterance(&binary, &args, killed, limit).await;
            running
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            let _ = done.send(result);
        });

        outcome
    }

    fn cancel(&self) {
        let switches: Vec<_> = self.lock_running().drain().collect();
        if !switches.is_empty() {
            debug!(count = switches.len(), "killing running espeak-ng utterances");
        }
        for (_, kill) in switches {
            let _ = kill.send(());
        }
    }
}

enum Finished {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Killed,
}

async fn run_utterance(
    binary: &Path,
    args: &[String],
    killed: oneshot::Receiver<()>,
    limit: Duration,
) -> UtteranceResult {
    let mut command = Command::new(binary);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(command = ?command, "running espeak-ng");
    let mut child = command
        .spawn()
        .map_err(|e| EngineError::Spawn(format!("failed to spawn {}: {}", binary.display(), e)))?;

    // Drain stderr while the process runs so a chatty synthesizer cannot
    // block on a full pipe.
    let stderr = child.stderr.take().map(|pipe| tokio::spawn(read_stderr(pipe)));

    let finished = tokio::select! {
        waited = tokio::time::timeout(limit, child.wait()) => match waited {
            Ok(status) => Finished::Exited(status),
            Err(_) => Finished::TimedOut,
        },
        // A dropped kill switch means the engine itself is gone.
        _ = killed => Finished::Killed,
    };

    let status = match finished {
        Finished::Exited(status) => status
            .map_err(|e| EngineError::Synthesis(format!("failed to wait for espeak-ng: {}", e)))?,
        Finished::TimedOut => {
            let _ = child.kill().await;
            abort_reader(stderr);
            return Err(EngineError::Timeout(limit.as_millis() as u64));
        }
        Finished::Killed => {
            let _ = child.kill().await;
            abort_reader(stderr);
            return Err(EngineError::Interrupted);
        }
    };

    if status.success() {
        abort_reader(stderr);
    } else {
        let stderr = match stderr {
            Some(reader) => reader.await.unwrap_or_default(),
            None => String::new(),
        };
        return Err(EngineError::Synthesis(format!(
            "espeak-ng failed ({}): {}",
            status,
            stderr.trim()
        )));
    }

    Ok(())
}

fn abort_reader(reader: Option<JoinHandle<String>>) {
    if let Some(reader) = reader {
        reader.abort();
    }
}

async fn read_stderr(mut pipe: ChildStderr) -> String {
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

async fn list_voices(binary: &Path) -> Result<Vec<Voice>, EngineError> {
    let output = Command::new(binary)
        .arg("--voices")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| EngineError::Spawn(format!("failed to run {}: {}", binary.display(), e)))?;

    if !output.status.success() {
        return Err(EngineError::Synthesis(format!(
            "voice listing failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Parses the table printed by `espeak-ng --voices`.
///
/// Each row reads `Pty Language Age/Gender VoiceName File [Other Languages]`.
/// The header and malformed rows are skipped.
pub fn parse_voice_list(listing: &str) -> Vec<Voice> {
    listing.lines().filter_map(parse_voice_row).collect()
}

fn parse_voice_row(line: &str) -> Option<Voice> {
    let mut fields = line.split_whitespace();
    fields.next()?.parse::<u32>().ok()?;
    let language = fields.next()?;
    let _age_gender = fields.next()?;
    let name = fields.next()?;
    let _file = fields.next()?;

    Some(Voice::new(name.replace('_', " "), language).with_default(language == DEFAULT_LANGUAGE))
}

/// Builds the synthesizer arguments for one utterance.
pub(crate) fn utterance_args(utterance: &Utterance) -> Vec<String> {
    let params = &utterance.params;
    let wpm = (BASE_WPM * params.rate).round().clamp(80.0, 450.0) as i32;
    let pitch = (50.0 * params.pitch).round().clamp(0.0, 99.0) as i32;
    let amplitude = (100.0 * params.volume).round().clamp(0.0, 200.0) as i32;

    vec![
        "-v".to_string(),
        utterance.voice.language_tag.clone(),
        "-s".to_string(),
        wpm.to_string(),
        "-p".to_string(),
        pitch.to_string(),
        "-a".to_string(),
        amplitude.to_string(),
        "--".to_string(),
        utterance.text.clone(),
    ]
}

fn resolve_binary(config: &EspeakConfig) -> Option<PathBuf> {
    if let Some(binary) = &config.binary {
        if binary.exists() {
            return Some(binary.clone());
        }
        warn!(bin = ?binary, "configured espeak-ng binary does not exist, searching PATH");
    }
    find_on_path("espeak-ng").or_else(|| find_on_path("espeak"))
}

fn find_on_path(bin: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(bin))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eleonor_types::SpeechParams;

    const LISTING: &str = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 5  en              --/M      English_(Great_Britain) gmw/en     (en 2)
 5  es              --/M      Spanish_(Spain)    roa/es
 5  es-419          --/M      Spanish_(Latin_America) roa/es-419   (es-mx 6)
garbage line
";

    fn utterance(params: SpeechParams) -> Utterance {
        Utterance {
            text: "Hola, soy Eleonor".to_string(),
            voice: Voice::new("Spanish (Spain)", "es"),
            params,
        }
    }

    #[test]
    fn parses_voice_listing() {
        let voices = parse_voice_list(LISTING);
        assert_eq!(voices.len(), 4);
        assert_eq!(voices[0], Voice::new("Afrikaans", "af"));
        assert_eq!(
            voices[1],
            Voice::new("English (Great Britain)", "en").with_default(true)
        );
        assert_eq!(voices[3].name, "Spanish (Latin America)");
        assert_eq!(voices[3].language_tag, "es-419");
    }

    #[test]
    fn empty_listing_yields_empty_catalog() {
        assert!(parse_voice_list("").is_empty());
        assert!(parse_voice_list("Pty Language Age/Gender VoiceName File\n").is_empty());
    }

    #[test]
    fn maps_params_to_flags() {
        let args = utterance_args(&utterance(SpeechParams {
            rate: 1.0,
            pitch: 1.0,
            volume: 0.5,
        }));
        assert_eq!(
            args,
            [
                "-v",
                "es",
                "-s",
                "175",
                "-p",
                "50",
                "-a",
                "50",
                "--",
                "Hola, soy Eleonor"
            ]
        );
    }

    #[test]
    fn clamps_extreme_params() {
        let args = utterance_args(&utterance(SpeechParams {
            rate: 10.0,
            pitch: 2.0,
            volume: 0.0,
        }));
        assert_eq!(args[3], "450");
        assert_eq!(args[5], "99");
        assert_eq!(args[7], "0");

        let slow = utterance_args(&utterance(SpeechParams {
            rate: 0.1,
            ..SpeechParams::default()
        }));
        assert_eq!(slow[3], "80");
    }

    #[test]
    fn spawn_outside_runtime_is_an_error() {
        let result = EspeakEngine::spawn("/usr/bin/espeak-ng", &EspeakConfig::default());
        assert!(matches!(result, Err(EngineError::Spawn(_))));
    }

    #[test]
    fn missing_configured_binary_falls_back_to_path_search() {
        let config = EspeakConfig {
            binary: Some(PathBuf::from("/definitely/not/here/espeak-ng")),
            ..EspeakConfig::default()
        };
        let resolved = resolve_binary(&config);
        assert_ne!(resolved, config.binary);
    }
}
