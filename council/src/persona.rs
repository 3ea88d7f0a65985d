//! Persona definitions and the preset council roster.

use serde::{Deserialize, Serialize};

/// Role of a persona within the council.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaRole {
    /// Opens the session and, absent a moderator, anchors it.
    Speaker,
    /// Synthesizes the final answer from the full transcript.
    Moderator,
    /// Contributes one turn per round.
    Councilor,
    /// Domain expert; participates in rounds exactly like a councilor.
    Specialist,
}

impl std::fmt::Display for PersonaRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Speaker => write!(f, "speaker"),
            Self::Moderator => write!(f, "moderator"),
            Self::Councilor => write!(f, "councilor"),
            Self::Specialist => write!(f, "specialist"),
        }
    }
}

/// Configuration for a single persona. Immutable once loaded for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Stable identifier, referenced by rosters and memories.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Role tag governing turn responsibilities.
    pub role: PersonaRole,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Disabled personas are ignored by roster resolution unless
    /// dynamically suggested.
    pub enabled: bool,
    /// Character instructions. `None` falls back to the generic role prompt.
    pub instructions: Option<String>,
}

impl PersonaConfig {
    /// Create an enabled persona with no instruction override.
    pub fn new(id: &str, name: &str, role: PersonaRole, model: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            role,
            model: model.to_string(),
            enabled: true,
            instructions: None,
        }
    }

    /// Attach character instructions.
    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.instructions = Some(instructions.to_string());
        self
    }

    /// Mark the persona disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// The twelve-member preset council, all bound to the same model.
///
/// Characters follow the original Council Chamber cast; callers typically
/// enable a subset before resolving the roster.
pub fn preset_personas(model: &str) -> Vec<PersonaConfig> {
    vec![
        PersonaConfig::new("speaker", "The Speaker", PersonaRole::Speaker, model)
            .with_instructions(
                "You are the Speaker, a balanced, wise facilitator who synthesizes perspectives.",
            ),
        PersonaConfig::new("moderator", "The Moderator", PersonaRole::Moderator, model)
            .with_instructions(
                "You are the Moderator. You keep discussion balanced and ensure all voices are heard.",
            ),
        PersonaConfig::new("technocrat", "The Technocrat", PersonaRole::Specialist, model)
            .with_instructions(
                "You are the Technocrat: analytical, data-driven, focused on technical feasibility.",
            ),
        PersonaConfig::new("ethicist", "The Ethicist", PersonaRole::Councilor, model)
            .with_instructions(
                "You are the Ethicist, concerned with moral implications and ethical boundaries.",
            ),
        PersonaConfig::new("pragmatist", "The Pragmatist", PersonaRole::Councilor, model)
            .with_instructions(
                "You are the Pragmatist, focused on practical implementation and real-world constraints.",
            ),
        PersonaConfig::new("visionary", "The Visionary", PersonaRole::Councilor, model)
            .with_instructions(
                "You are the Visionary: imaginative, forward-thinking, sees long-term possibilities.",
            ),
        PersonaConfig::new("skeptic", "The Skeptic", PersonaRole::Councilor, model)
            .with_instructions(
                "You are the Skeptic. You challenge assumptions, demand evidence, identify risks.",
            ),
        PersonaConfig::new("sentinel", "The Sentinel", PersonaRole::Specialist, model)
            .with_instructions(
                "You are the Sentinel. You guard against harm and prioritize safety and security.",
            ),
        PersonaConfig::new("historian", "The Historian", PersonaRole::Councilor, model)
            .with_instructions(
                "You are the Historian, providing historical context and pattern recognition.",
            ),
        PersonaConfig::new("diplomat", "The Diplomat", PersonaRole::Councilor, model)
            .with_instructions(
                "You are the Diplomat. You seek consensus, mediate conflicts, build bridges.",
            ),
        PersonaConfig::new("journalist", "The Journalist", PersonaRole::Councilor, model)
            .with_instructions(
                "You are the Journalist. You ask probing questions and seek clarity and truth.",
            ),
        PersonaConfig::new("psychologist", "The Psychologist", PersonaRole::Councilor, model)
            .with_instructions(
                "You are the Psychologist, attentive to human behavior and cognitive biases.",
            ),
    ]
}
