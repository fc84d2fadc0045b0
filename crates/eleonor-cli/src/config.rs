//! Configuration loading from file and environment variables.

use eleonor_voice::{EspeakConfig, VoiceConfig};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Voice selection and default acoustic settings.
    #[serde(default)]
    pub voice: VoiceConfig,

    /// Synthesizer settings.
    #[serde(default)]
    pub espeak: EspeakConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "eleonor_voice=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `ELEONOR_LOG_LEVEL` overrides `logging.level`
/// - `ELEONOR_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `ELEONOR_VOICE_LANGUAGE` overrides `voice.language_prefix`
/// - `ELEONOR_VOICE_PERSONA` overrides `voice.persona_hint`
/// - `ELEONOR_ESPEAK_BIN` overrides `espeak.binary`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = read_config_file(path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn read_config_file(path: Option<&str>) -> Result<Config, ConfigError> {
    match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Ok(Config::default())
            }
            Err(e) => Err(ConfigError::FileRead(e)),
        },
        None => Ok(Config::default()),
    }
}

/// Applies `ELEONOR_*` overrides looked up through `lookup`.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(level) = lookup("ELEONOR_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("ELEONOR_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(language) = lookup("ELEONOR_VOICE_LANGUAGE") {
        if !language.trim().is_empty() {
            config.voice.language_prefix = language;
        }
    }
    if let Some(persona) = lookup("ELEONOR_VOICE_PERSONA") {
        config.voice.persona_hint = persona;
    }
    if let Some(binary) = lookup("ELEONOR_ESPEAK_BIN") {
        if !binary.trim().is_empty() {
            config.espeak.binary = Some(PathBuf::from(binary));
        }
    }
}
