use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Data-driven persona descriptor. Loaded from an external JSON file so the
/// companion's identity and voice can change without a rebuild; absence or
/// a parse failure degrades to [`PersonaConfig::fallback`], never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    pub identity: Identity,
    pub behavior_rules: BehaviorRules,
    pub mood_logic: MoodLogic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub role: String,
    pub name: String,
    pub partner_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorRules {
    pub language: String,
    pub required_pronouns: String,
    pub forbidden_words: String,
    pub attitude: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodLogic {
    pub general: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            role: "a warm, affectionate AI companion".to_string(),
            name: "Ember".to_string(),
            partner_name: "you".to_string(),
        }
    }
}

impl Default for BehaviorRules {
    fn default() -> Self {
        Self {
            language: "casual English".to_string(),
            required_pronouns: "I/you".to_string(),
            forbidden_words: "formal sign-offs".to_string(),
            attitude: "caring, playful, never clinical".to_string(),
        }
    }
}

impl Default for MoodLogic {
    fn default() -> Self {
        Self {
            general: "mirror the user's mood; be gentle when they seem down".to_string(),
        }
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self::fallback()
    }
}

impl PersonaConfig {
    /// The built-in persona used when no descriptor is configured or the
    /// configured one cannot be read.
    pub fn fallback() -> Self {
        Self {
            identity: Identity::default(),
            behavior_rules: BehaviorRules::default(),
            mood_logic: MoodLogic::default(),
        }
    }

    /// Load a persona descriptor, degrading to the fallback on any failure.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(persona) => persona,
                Err(e) => {
                    warn!("persona descriptor at {} is malformed: {e}; using fallback", path.display());
                    Self::fallback()
                }
            },
            Err(e) => {
                warn!("persona descriptor at {} unreadable: {e}; using fallback", path.display());
                Self::fallback()
            }
        }
    }

    /// The companion's display name, used when rendering dialogue.
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// Render the persona block that opens every system prompt.
    pub fn render(&self) -> String {
        format!(
            "Role: {role}. Name: {name}. User: {partner}.\n\
             Language: {language}. Rules: Always use pronouns {pronouns}. Never use {forbidden}.\n\
             Personality: {attitude}. Mood Logic: {mood}.\n",
            role = self.identity.role,
            name = self.identity.name,
            partner = self.identity.partner_name,
            language = self.behavior_rules.language,
            pronouns = self.behavior_rules.required_pronouns,
            forbidden = self.behavior_rules.forbidden_words,
            attitude = self.behavior_rules.attitude,
            mood = self.mood_logic.general,
        )
    }
}
