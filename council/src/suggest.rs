//! Persona suggestion service: ranks candidate personas for a topic.
//!
//! Failures here always degrade to "no dynamic suggestions"; they can
//! never abort a session.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::persona::PersonaConfig;
use crate::provider::{ChatMessage, ProviderClient, ProviderError};
use crate::session::SessionMode;

/// One ranked candidate persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaSuggestion {
    pub persona_id: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// Full response from the suggestion service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub suggestions: Vec<PersonaSuggestion>,
    #[serde(default)]
    pub reasoning: String,
}

/// Ranks candidate personas for a topic and mode.
#[async_trait]
pub trait PersonaSuggestionService: Send + Sync {
    async fn suggest(
        &self,
        topic: &str,
        mode: SessionMode,
    ) -> Result<SuggestionResponse, ProviderError>;
}

/// Null implementation: never suggests anything.
pub struct NoSuggestions;

#[async_trait]
impl PersonaSuggestionService for NoSuggestions {
    async fn suggest(
        &self,
        _topic: &str,
        _mode: SessionMode,
    ) -> Result<SuggestionResponse, ProviderError> {
        Ok(SuggestionResponse::default())
    }
}

/// Model-backed suggestion service.
///
/// Asks the provider for a strict JSON ranking of the candidate personas;
/// an unparseable reply degrades to an empty response rather than failing.
pub struct ModelSuggestionService {
    provider: Arc<dyn ProviderClient>,
    routing_persona: PersonaConfig,
    candidates: Vec<String>,
}

impl ModelSuggestionService {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        routing_persona: PersonaConfig,
        candidates: Vec<String>,
    ) -> Self {
        Self {
            provider,
            routing_persona,
            candidates,
        }
    }
}

#[async_trait]
impl PersonaSuggestionService for ModelSuggestionService {
    async fn suggest(
        &self,
        topic: &str,
        mode: SessionMode,
    ) -> Result<SuggestionResponse, ProviderError> {
        let system = "You rank council personas by relevance to a topic. Reply with one \
                      JSON object only: {\"suggestions\": [{\"persona_id\": \"...\", \
                      \"confidence\": 0.0, \"reasoning\": \"...\"}], \"reasoning\": \"...\"}";
        let user = format!(
            "Topic: {topic}\nMode: {mode}\nCandidate personas: {}",
            self.candidates.join(", ")
        );
        let context = [ChatMessage::system(system), ChatMessage::user(&user)];

        let raw = self
            .provider
            .get_response(&self.routing_persona, &context)
            .await?;

        match serde_json::from_str::<SuggestionResponse>(raw.trim()) {
            Ok(mut response) => {
                for s in &mut response.suggestions {
                    s.confidence = s.confidence.clamp(0.0, 1.0);
                }
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(error = %e, "unparseable suggestion reply, degrading to none");
                Ok(SuggestionResponse::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaRole;

    struct CannedProvider {
        reply: String,
    }

    #[async_trait]
    impl ProviderClient for CannedProvider {
        async fn get_response(
            &self,
            _persona: &PersonaConfig,
            _context: &[ChatMessage],
        ) -> Result<String, ProviderError> {
            Ok(self.reply.clone())
        }
    }

    fn service(reply: &str) -> ModelSuggestionService {
        ModelSuggestionService::new(
            Arc::new(CannedProvider {
                reply: reply.to_string(),
            }),
            PersonaConfig::new("router", "Router", PersonaRole::Councilor, "m"),
            vec!["sentinel".to_string(), "historian".to_string()],
        )
    }

    #[tokio::test]
    async fn test_no_suggestions_is_empty() {
        let response = NoSuggestions
            .suggest("anything", SessionMode::Deliberation)
            .await
            .unwrap();
        assert!(response.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_parses_strict_json() {
        let reply = r#"{"suggestions": [{"persona_id": "sentinel", "confidence": 0.9, "reasoning": "security topic"}], "reasoning": "ok"}"#;
        let response = service(reply)
            .suggest("supply chain security", SessionMode::Deliberation)
            .await
            .unwrap();
        assert_eq!(response.suggestions.len(), 1);
        assert_eq!(response.suggestions[0].persona_id, "sentinel");
    }

    #[tokio::test]
    async fn test_garbage_reply_degrades_to_empty() {
        let response = service("I think sentinel would be great here!")
            .suggest("security", SessionMode::Deliberation)
            .await
            .unwrap();
        assert!(response.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_confidence_clamped() {
        let reply = r#"{"suggestions": [{"persona_id": "sentinel", "confidence": 7.5}]}"#;
        let response = service(reply)
            .suggest("security", SessionMode::Deliberation)
            .await
            .unwrap();
        assert_eq!(response.suggestions[0].confidence, 1.0);
    }
}
