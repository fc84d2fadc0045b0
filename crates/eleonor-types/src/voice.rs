//! Voice catalog entries and acoustic parameters.
//!
//! A `Voice` is one entry of the catalog a synthesis engine exposes.
//! `SpeechOptions` carries the optional per-request overrides a caller may
//! pass to `speak`, and `SpeechParams` is what actually reaches the engine
//! after defaults and range limits have been applied.

use serde::{Deserialize, Serialize};

/// Slowest accepted speech rate multiplier.
pub const MIN_RATE: f32 = 0.1;
/// Fastest accepted speech rate multiplier.
pub const MAX_RATE: f32 = 10.0;
/// Highest accepted pitch multiplier. The lowest is 0.
pub const MAX_PITCH: f32 = 2.0;
/// Highest accepted volume. The lowest is 0 (silent).
pub const MAX_VOLUME: f32 = 1.0;

/// A synthetic voice offered by a synthesis engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Voice {
    /// Human-readable display name, e.g. `"Helena (female)"`.
    pub name: String,
    /// BCP 47 style language tag, e.g. `"es-MX"`.
    pub language_tag: String,
    /// Whether the engine reports this voice as its platform default.
    #[serde(default)]
    pub is_default: bool,
}

impl Voice {
    pub fn new(name: impl Into<String>, language_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language_tag: language_tag.into(),
            is_default: false,
        }
    }

    /// Marks this voice as the engine default.
    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    /// Returns true if the language tag starts with `prefix`, ignoring ASCII case.
    pub fn matches_language(&self, prefix: &str) -> bool {
        self.language_tag
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    }

    /// Returns true if the display name contains `hint`, ignoring case.
    pub fn has_persona(&self, hint: &str) -> bool {
        self.name.to_lowercase().contains(&hint.to_lowercase())
    }
}

/// Optional acoustic overrides for a single `speak` request.
///
/// Unset and non-finite fields fall back to the service defaults. An explicit
/// `0.0` is kept as an override and clamped like any other value, so a zero
/// rate plays at `MIN_RATE` and a zero volume is silent rather than the
/// default 0.8.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpeechOptions {
    #[serde(default)]
    pub rate: Option<f32>,
    #[serde(default)]
    pub pitch: Option<f32>,
    #[serde(default)]
    pub volume: Option<f32>,
}

impl SpeechOptions {
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = Some(pitch);
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }
}

/// Resolved acoustic parameters handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeechParams {
    /// Rate multiplier (1.0 is the engine's normal speed).
    pub rate: f32,
    /// Pitch multiplier (1.0 is the voice's normal pitch).
    pub pitch: f32,
    /// Output volume between 0.0 and 1.0.
    pub volume: f32,
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self {
            rate: 0.9,
            pitch: 1.0,
            volume: 0.8,
        }
    }
}

impl SpeechParams {
    /// Applies `options` on top of `self` as defaults.
    ///
    /// Non-finite overrides are ignored, and every value is clamped to the
    /// range engines accept.
    pub fn resolve(&self, options: &SpeechOptions) -> Self {
        Self {
            rate: pick(options.rate, self.rate).clamp(MIN_RATE, MAX_RATE),
            pitch: pick(options.pitch, self.pitch).clamp(0.0, MAX_PITCH),
            volume: pick(options.volume, self.volume).clamp(0.0, MAX_VOLUME),
        }
    }
}

fn pick(value: Option<f32>, default: f32) -> f32 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => default,
    }
}
