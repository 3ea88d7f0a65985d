//! Runtime configuration for council sessions.

use serde::{Deserialize, Serialize};

use crate::provider::RetryPolicy;

/// Tunables for the orchestrator and context assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilConfig {
    /// Rounds to run in deliberation mode.
    pub deliberation_rounds: u32,
    /// Round cap for swarm coding when no completion signal arrives.
    pub max_swarm_rounds: u32,
    /// Retry policy for provider calls.
    pub retry: RetryPolicy,
    /// Transcript budget in characters, most-recent-first retention.
    pub transcript_budget_chars: usize,
    /// Maximum nested tool calls within a single persona turn.
    pub max_tool_depth: u32,
    /// Per-tool-call timeout in seconds.
    pub tool_timeout_secs: u64,
    /// Minimum confidence for merging a dynamically suggested persona.
    pub suggestion_confidence_threshold: f64,
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            deliberation_rounds: 2,
            max_swarm_rounds: 8,
            retry: RetryPolicy::default(),
            transcript_budget_chars: 6000,
            max_tool_depth: 3,
            tool_timeout_secs: 30,
            suggestion_confidence_threshold: 0.6,
        }
    }
}

impl CouncilConfig {
    /// Defaults with `COUNCIL_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = env_parse("COUNCIL_DELIBERATION_ROUNDS") {
            config.deliberation_rounds = n;
        }
        if let Some(n) = env_parse("COUNCIL_MAX_SWARM_ROUNDS") {
            config.max_swarm_rounds = n;
        }
        if let Some(n) = env_parse("COUNCIL_MAX_RETRIES") {
            config.retry.max_retries = n;
        }
        if let Some(n) = env_parse("COUNCIL_TRANSCRIPT_BUDGET") {
            config.transcript_budget_chars = n;
        }
        if let Some(n) = env_parse("COUNCIL_MAX_TOOL_DEPTH") {
            config.max_tool_depth = n;
        }
        if let Some(n) = env_parse("COUNCIL_TOOL_TIMEOUT_SECS") {
            config.tool_timeout_secs = n;
        }
        config
    }

    /// Rounds budget for a mode.
    pub fn max_rounds_for(&self, mode: crate::session::SessionMode) -> u32 {
        match mode {
            crate::session::SessionMode::Deliberation => self.deliberation_rounds,
            crate::session::SessionMode::SwarmCoding => self.max_swarm_rounds,
            crate::session::SessionMode::Inquiry => 0,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
