use crate::error::VoiceError;
use eleonor_types::{SpeechOptions, SpeechParams};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_language_prefix() -> String {
    "es".to_string()
}

fn default_persona_hint() -> String {
    "female".to_string()
}

fn default_rate() -> f32 {
    SpeechParams::default().rate
}

fn default_pitch() -> f32 {
    SpeechParams::default().pitch
}

fn default_volume() -> f32 {
    SpeechParams::default().volume
}

fn default_utterance_timeout_ms() -> u64 {
    60_000
}

/// Voice selection and default acoustic settings for `VoiceOutputService`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Language tag prefix the selection policy targets. Default: `"es"`.
    #[serde(default = "default_language_prefix")]
    pub language_prefix: String,
    /// Substring of a voice name that marks the preferred persona. Default: `"female"`.
    #[serde(default = "default_persona_hint")]
    pub persona_hint: String,
    /// Default speech rate multiplier. Default: 0.9.
    #[serde(default = "default_rate")]
    pub rate: f32,
    /// Default pitch multiplier. Default: 1.0.
    #[serde(default = "default_pitch")]
    pub pitch: f32,
    /// Default volume. Default: 0.8.
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Give up waiting for the engine's catalog notification after this many
    /// milliseconds. Unset means wait indefinitely.
    #[serde(default)]
    pub discovery_timeout_ms: Option<u64>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language_prefix: default_language_prefix(),
            persona_hint: default_persona_hint(),
            rate: default_rate(),
            pitch: default_pitch(),
            volume: default_volume(),
            discovery_timeout_ms: None,
        }
    }
}

impl VoiceConfig {
    /// Checks that the configuration can drive voice selection.
    pub fn validate(&self) -> Result<(), VoiceError> {
        if self.language_prefix.trim().is_empty() {
            return Err(VoiceError::Config(
                "language_prefix must not be empty".to_string(),
            ));
        }
        for (field, value) in [
            ("rate", self.rate),
            ("pitch", self.pitch),
            ("volume", self.volume),
        ] {
            if !value.is_finite() {
                return Err(VoiceError::Config(format!(
                    "{} must be a finite number, got {}",
                    field, value
                )));
            }
        }
        Ok(())
    }

    /// Default acoustic parameters, clamped to the ranges engines accept.
    pub fn speech_defaults(&self) -> SpeechParams {
        SpeechParams::default().resolve(&SpeechOptions {
            rate: Some(self.rate),
            pitch: Some(self.pitch),
            volume: Some(self.volume),
        })
    }

    pub fn discovery_timeout(&self) -> Option<Duration> {
        self.discovery_timeout_ms.map(Duration::from_millis)
    }
}

/// Settings for the `espeak-ng` backed engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EspeakConfig {
    /// Explicit path to the synthesizer binary. When unset, `espeak-ng` and
    /// then `espeak` are looked up on `PATH`.
    #[serde(default)]
    pub binary: Option<PathBuf>,
    /// Upper bound on a single utterance, in milliseconds. Default: 60000.
    #[serde(default = "default_utterance_timeout_ms")]
    pub utterance_timeout_ms: u64,
}

impl Default for EspeakConfig {
    fn default() -> Self {
        Self {
            binary: None,
            utterance_timeout_ms: default_utterance_timeout_ms(),
        }
    }
}

impl EspeakConfig {
    pub fn utterance_timeout(&self) -> Duration {
        Duration::from_millis(self.utterance_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_yields_defaults() {
        let config: VoiceConfig = toml::from_str("").unwrap();
        assert_eq!(config, VoiceConfig::default());
        assert_eq!(config.language_prefix, "es");
        assert_eq!(config.persona_hint, "female");
        assert!(config.discovery_timeout().is_none());
    }

    #[test]
    fn speech_defaults_are_clamped() {
        let config = VoiceConfig {
            rate: 40.0,
            volume: 3.0,
            ..VoiceConfig::default()
        };
        let params = config.speech_defaults();
        assert_eq!(params.rate, 10.0);
        assert_eq!(params.pitch, 1.0);
        assert_eq!(params.volume, 1.0);
    }

    #[test]
    fn validate_rejects_empty_prefix_and_nan() {
        let empty = VoiceConfig {
            language_prefix: "  ".to_string(),
            ..VoiceConfig::default()
        };
        assert!(matches!(empty.validate(), Err(VoiceError::Config(_))));

        let nan = VoiceConfig {
            pitch: f32::NAN,
            ..VoiceConfig::default()
        };
        match nan.validate() {
            Err(VoiceError::Config(msg)) => assert!(msg.contains("pitch"), "got: {}", msg),
            other => panic!("expected Config error, got {:?}", other),
        }

        assert!(VoiceConfig::default().validate().is_ok());
    }

    #[test]
    fn espeak_config_parses_binary_and_timeout() {
        let config: EspeakConfig =
            toml::from_str("binary = \"/usr/bin/espeak-ng\"\nutterance_timeout_ms = 1500").unwrap();
        assert_eq!(config.binary, Some(PathBuf::from("/usr/bin/espeak-ng")));
        assert_eq!(config.utterance_timeout(), Duration::from_millis(1500));
        assert_eq!(
            EspeakConfig::default().utterance_timeout(),
            Duration::from_secs(60)
        );
    }
}
