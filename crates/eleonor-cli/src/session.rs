//! Line-driven speaking session.
//!
//! Stands in for the chat transcript: every line read from the console is an
//! assistant reply to be spoken, except for a handful of `/` commands that
//! control playback. Replies are spoken in the background so a new line can
//! interrupt the one still playing.

use eleonor_types::SpeechOptions;
use eleonor_voice::VoiceOutputService;
use serde_json::json;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Speak this reply.
    Speak(String),
    /// Halt the current reply.
    Stop,
    /// Disable speech and halt the current reply.
    Mute,
    /// Re-enable speech.
    Unmute,
    /// List the voices in the target language.
    Voices,
    /// Report readiness, the selected voice and the speaking flag.
    Status,
    /// Leave the session.
    Quit,
    /// A `/` command this session does not know.
    Unknown(String),
    /// A line with nothing on it.
    Blank,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Blank;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Speak(line.to_string());
        };
        match command.to_ascii_lowercase().as_str() {
            "stop" => Self::Stop,
            "mute" => Self::Mute,
            "unmute" => Self::Unmute,
            "voices" => Self::Voices,
            "status" => Self::Status,
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// What the console loop should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Print(String),
    Quit,
}

/// A console session driving one `VoiceOutputService`.
pub struct Session {
    service: VoiceOutputService,
    tts_enabled: bool,
    playbacks: JoinSet<()>,
}

impl Session {
    pub fn new(service: VoiceOutputService) -> Self {
        Self {
            service,
            tts_enabled: true,
            playbacks: JoinSet::new(),
        }
    }

    pub fn service(&self) -> &VoiceOutputService {
        &self.service
    }

    pub fn tts_enabled(&self) -> bool {
        self.tts_enabled
    }

    /// Number of replies whose playback task has not been collected yet.
    pub fn pending_playbacks(&self) -> usize {
        self.playbacks.len()
    }

    /// Applies one command. Must be called from within a Tokio runtime.
    pub fn handle(&mut self, command: ConsoleCommand) -> Flow {
        match command {
            ConsoleCommand::Speak(text) => {
                if self.tts_enabled {
                    self.speak_in_background(text);
                } else {
                    debug!("speech muted, reply not spoken");
                }
                Flow::Continue
            }
            ConsoleCommand::Stop => {
                self.service.stop();
                Flow::Continue
            }
            ConsoleCommand::Mute => {
                self.tts_enabled = false;
                self.service.stop();
                Flow::Print("speech muted".to_string())
            }
            ConsoleCommand::Unmute => {
                self.tts_enabled = true;
                Flow::Print("speech enabled".to_string())
            }
            ConsoleCommand::Voices => {
                Flow::Print(json!({ "voices": self.service.available_voices() }).to_string())
            }
            ConsoleCommand::Status => Flow::Print(
                json!({
                    "readiness": self.service.readiness(),
                    "selected_voice": self.service.selected_voice(),
                    "speaking": self.service.is_speaking(),
                    "tts_enabled": self.tts_enabled,
                })
                .to_string(),
            ),
            ConsoleCommand::Quit => Flow::Quit,
            ConsoleCommand::Unknown(command) => {
                Flow::Print(format!("unknown command: {}", command))
            }
            ConsoleCommand::Blank => Flow::Continue,
        }
    }

    fn speak_in_background(&mut self, text: String) {
        // Collect replies that already settled.
        while self.playbacks.try_join_next().is_some() {}

        let service = self.service.clone();
        self.playbacks.spawn(async move {
            match service.speak(&text, SpeechOptions::default()).await {
                Ok(outcome) => debug!(?outcome, "reply settled"),
                Err(e) => warn!(error = %e, "failed to speak reply"),
            }
        });
    }

    /// Waits for every reply still playing to settle.
    pub async fn finish(&mut self) {
        while self.playbacks.join_next().await.is_some() {}
    }

    /// Halts speech and waits for outstanding replies to settle.
    pub async fn shutdown(&mut self) {
        self.service.stop();
        self.finish().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_replies_and_commands() {
        assert_eq!(
            ConsoleCommand::parse("  Hola, ¿cómo estás?  "),
            ConsoleCommand::Speak("Hola, ¿cómo estás?".to_string())
        );
        assert_eq!(ConsoleCommand::parse("/stop"), ConsoleCommand::Stop);
        assert_eq!(ConsoleCommand::parse("/MUTE"), ConsoleCommand::Mute);
        assert_eq!(ConsoleCommand::parse("/unmute"), ConsoleCommand::Unmute);
        assert_eq!(ConsoleCommand::parse("/voices"), ConsoleCommand::Voices);
        assert_eq!(ConsoleCommand::parse("/status"), ConsoleCommand::Status);
        assert_eq!(ConsoleCommand::parse("/exit"), ConsoleCommand::Quit);
        assert_eq!(
            ConsoleCommand::parse("/dance"),
            ConsoleCommand::Unknown("/dance".to_string())
        );
        assert_eq!(ConsoleCommand::parse("   "), ConsoleCommand::Blank);
    }

    #[tokio::test]
    async fn status_reports_disabled_service() {
        let mut session = Session::new(VoiceOutputService::disabled());

        let Flow::Print(status) = session.handle(ConsoleCommand::Status) else {
            panic!("status should print");
        };
        let status: serde_json::Value = serde_json::from_str(&status).unwrap();
        assert_eq!(status["readiness"], "uninitialized");
        assert!(status["selected_voice"].is_null());
        assert_eq!(status["speaking"], false);
        assert_eq!(status["tts_enabled"], true);

        let Flow::Print(voices) = session.handle(ConsoleCommand::Voices) else {
            panic!("voices should print");
        };
        assert_eq!(voices, r#"{"voices":[]}"#);
    }

    #[tokio::test]
    async fn muted_session_does_not_speak() {
        let mut session = Session::new(VoiceOutputService::disabled());

        assert_eq!(
            session.handle(ConsoleCommand::Mute),
            Flow::Print("speech muted".to_string())
        );
        assert!(!session.tts_enabled());
        session.handle(ConsoleCommand::Speak("Hola".to_string()));
        assert_eq!(session.pending_playbacks(), 0);

        session.handle(ConsoleCommand::Unmute);
        session.handle(ConsoleCommand::Speak("Hola".to_string()));
        assert_eq!(session.pending_playbacks(), 1);
        session.finish().await;
        assert_eq!(session.pending_playbacks(), 0);
    }

    #[tokio::test]
    async fn quit_and_unknown_commands() {
        let mut session = Session::new(VoiceOutputService::disabled());
        assert_eq!(session.handle(ConsoleCommand::Quit), Flow::Quit);
        assert_eq!(session.handle(ConsoleCommand::Blank), Flow::Continue);
        assert_eq!(
            session.handle(ConsoleCommand::Unknown("/dance".to_string())),
            Flow::Print("unknown command: /dance".to_string())
        );
        session.shutdown().await;
    }
}
