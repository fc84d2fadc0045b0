//! Voice selection policy.
//!
//! The policy picks one voice out of an engine catalog, first match wins:
//!
//! 1. a voice in the target language whose name carries the persona hint
//! 2. any voice in the target language
//! 3. the first voice in the catalog
//!
//! An empty catalog yields no voice.

use crate::config::VoiceConfig;
use eleonor_types::Voice;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    language_prefix: String,
    persona_hint: String,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::from(&VoiceConfig::default())
    }
}

impl From<&VoiceConfig> for SelectionPolicy {
    fn from(config: &VoiceConfig) -> Self {
        Self::new(&config.language_prefix, &config.persona_hint)
    }
}

impl SelectionPolicy {
    pub fn new(language_prefix: impl Into<String>, persona_hint: impl Into<String>) -> Self {
        Self {
            language_prefix: language_prefix.into(),
            persona_hint: persona_hint.into(),
        }
    }

    pub fn language_prefix(&self) -> &str {
        &self.language_prefix
    }

    /// Picks the best-fit voice from `catalog`.
    pub fn select<'a>(&self, catalog: &'a [Voice]) -> Option<&'a Voice> {
        catalog
            .iter()
            .find(|v| {
                v.matches_language(&self.language_prefix) && v.has_persona(&self.persona_hint)
            })
            .or_else(|| {
                catalog
                    .iter()
                    .find(|v| v.matches_language(&self.language_prefix))
            })
            .or_else(|| catalog.first())
    }

    /// Returns the voices in the target language, in catalog order.
    pub fn matching(&self, catalog: &[Voice]) -> Vec<Voice> {
        catalog
            .iter()
            .filter(|v| v.matches_language(&self.language_prefix))
            .cloned()
            .collect()
    }
}
