//! Roster resolution: which personas participate, and in what order.

use crate::error::CouncilError;
use crate::persona::{PersonaConfig, PersonaRole};
use crate::session::SessionMode;
use crate::suggest::PersonaSuggestionService;

/// A councilor seat in the resolved roster.
#[derive(Debug, Clone)]
pub struct RosterMember {
    pub persona: PersonaConfig,
    /// Whether the persona was merged in by the suggestion service rather
    /// than statically enabled.
    pub dynamically_added: bool,
}

/// The resolved participant set for one session.
///
/// `councilors` order is the deterministic turn order: stable insertion
/// order of resolution, never re-sorted.
#[derive(Debug, Clone)]
pub struct Roster {
    pub speaker: PersonaConfig,
    pub moderator: Option<PersonaConfig>,
    pub councilors: Vec<RosterMember>,
}

impl Roster {
    /// All distinct persona ids in the roster.
    pub fn persona_ids(&self) -> Vec<String> {
        let mut ids = vec![self.speaker.id.clone()];
        if let Some(ref m) = self.moderator {
            ids.push(m.id.clone());
        }
        ids.extend(self.councilors.iter().map(|c| c.persona.id.clone()));
        ids
    }

    fn contains(&self, persona_id: &str) -> bool {
        self.speaker.id == persona_id
            || self.moderator.as_ref().is_some_and(|m| m.id == persona_id)
            || self.councilors.iter().any(|c| c.persona.id == persona_id)
    }
}

/// Resolve the active roster for a session.
///
/// Fatal `Configuration` errors: zero or multiple enabled speakers, or
/// multiple enabled moderators. Every enabled persona whose role is neither
/// speaker nor moderator joins the councilor list; that includes
/// specialists. When the mode permits it, suggestions at or above the
/// confidence threshold are merged in, tagged as dynamically added, without
/// removing any statically enabled persona.
pub async fn resolve_roster(
    personas: &[PersonaConfig],
    mode: SessionMode,
    topic: &str,
    suggester: &dyn PersonaSuggestionService,
    confidence_threshold: f64,
) -> Result<Roster, CouncilError> {
    let enabled: Vec<&PersonaConfig> = personas.iter().filter(|p| p.enabled).collect();

    let mut speakers = enabled.iter().filter(|p| p.role == PersonaRole::Speaker);
    let speaker = match (speakers.next(), speakers.next()) {
        (Some(s), None) => (*s).clone(),
        (None, _) => {
            return Err(CouncilError::Configuration(
                "no enabled speaker in persona list".to_string(),
            ))
        }
        (Some(_), Some(_)) => {
            return Err(CouncilError::Configuration(
                "more than one enabled speaker in persona list".to_string(),
            ))
        }
    };

    let mut moderators = enabled.iter().filter(|p| p.role == PersonaRole::Moderator);
    let moderator = match (moderators.next(), moderators.next()) {
        (m, None) => m.map(|p| (*p).clone()),
        (_, Some(_)) => {
            return Err(CouncilError::Configuration(
                "more than one enabled moderator in persona list".to_string(),
            ))
        }
    };

    // Councilors and specialists alike: everything that is neither the
    // speaker nor the moderator.
    let mut roster = Roster {
        speaker,
        moderator,
        councilors: enabled
            .iter()
            .filter(|p| p.role != PersonaRole::Speaker && p.role != PersonaRole::Moderator)
            .map(|p| RosterMember {
                persona: (*p).clone(),
                dynamically_added: false,
            })
            .collect(),
    };

    if !mode.allows_dynamic_personas() {
        return Ok(roster);
    }

    let response = match suggester.suggest(topic, mode).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "persona suggestion failed, continuing without");
            return Ok(roster);
        }
    };

    for suggestion in response.suggestions {
        if suggestion.confidence < confidence_threshold {
            tracing::debug!(
                persona = %suggestion.persona_id,
                confidence = suggestion.confidence,
                "suggestion below threshold, skipped"
            );
            continue;
        }
        if roster.contains(&suggestion.persona_id) {
            continue;
        }
        let Some(persona) = personas.iter().find(|p| p.id == suggestion.persona_id) else {
            tracing::warn!(persona = %suggestion.persona_id, "suggested persona is unknown");
            continue;
        };
        if matches!(persona.role, PersonaRole::Speaker | PersonaRole::Moderator) {
            continue;
        }
        tracing::info!(
            persona = %persona.id,
            confidence = suggestion.confidence,
            "dynamically adding suggested persona"
        );
        roster.councilors.push(RosterMember {
            persona: persona.clone(),
            dynamically_added: true,
        });
    }

    Ok(roster)
}
