//! Council error taxonomy.
//!
//! Only `Configuration` is surfaced to callers as a thrown fault, and only
//! at session creation time. Every other failure is reflected in session
//! status plus an explanatory SYSTEM message in the transcript.

use thiserror::Error;

use crate::provider::ProviderError;
use crate::store::StoreError;
use crate::tools::ToolError;

/// Errors produced by council orchestration.
#[derive(Debug, Error)]
pub enum CouncilError {
    /// Roster assembly failed: no valid speaker, or a malformed roster.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Provider call failed after exhausting the retry policy.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A tool invocation failed. Non-fatal; surfaced as the tool's output.
    #[error("tool execution failed: {0}")]
    ToolExecution(#[from] ToolError),

    /// A store write failed. Fatal for the session, never swallowed.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// A legacy session file could not be migrated.
    #[error("migration failed for `{file}`: {reason}")]
    Migration { file: String, reason: String },
}

/// Result alias for council operations.
pub type CouncilResult<T> = Result<T, CouncilError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CouncilError::Configuration("no enabled speaker".to_string());
        assert!(err.to_string().contains("no enabled speaker"));

        let err = CouncilError::Migration {
            file: "old.json".to_string(),
            reason: "bad json".to_string(),
        };
        assert!(err.to_string().contains("old.json"));
        assert!(err.to_string().contains("bad json"));
    }
}
