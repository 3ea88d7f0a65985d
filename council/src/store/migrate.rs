//! Legacy session migration.
//!
//! The previous Council Chamber kept one JSON file per session under a
//! sessions directory. Each file is replayed through the store's normal
//! create/append contract. Migration is idempotent (a session id that
//! already exists is skipped) and per-file failures are counted without
//! aborting the batch.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::session::{NewMessage, SessionMode, SessionStatus};

use super::{SessionSettings, SessionStore, StoreError, StoreResult};

/// Outcome counts for one migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MigrationReport {
    /// Sessions replayed into the store this run.
    pub migrated: usize,
    /// Sessions whose id already existed in the store.
    pub skipped: usize,
    /// Files that could not be read, parsed, or replayed.
    pub failed: usize,
}

/// Legacy on-disk session shape.
#[derive(Debug, Deserialize)]
struct LegacySession {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(default)]
    mode: String,
    #[serde(default)]
    topic: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    messages: Vec<LegacyMessage>,
    #[serde(default)]
    consensus: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegacyMessage {
    councilor: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: String,
}

fn legacy_mode(raw: &str) -> SessionMode {
    raw.parse().unwrap_or(SessionMode::Deliberation)
}

fn legacy_status(raw: &str) -> SessionStatus {
    match raw {
        "completed" => SessionStatus::Completed,
        "failed" => SessionStatus::Failed,
        _ => SessionStatus::Active,
    }
}

/// Migrate every `*.json` file under `dir` into the store.
///
/// The store-level error is returned only for directory access problems;
/// everything per-file lands in the report.
pub async fn migrate_legacy_sessions(
    dir: &Path,
    store: &dyn SessionStore,
) -> StoreResult<MigrationReport> {
    let mut report = MigrationReport::default();
    if !dir.exists() {
        return Ok(report);
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    paths.sort();

    for path in paths {
        match migrate_file(&path, store).await {
            Ok(true) => report.migrated += 1,
            Ok(false) => report.skipped += 1,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "legacy session migration failed");
                report.failed += 1;
            }
        }
    }

    info!(
        migrated = report.migrated,
        skipped = report.skipped,
        failed = report.failed,
        "legacy session migration finished"
    );
    Ok(report)
}

/// Returns `Ok(true)` when migrated, `Ok(false)` when already present.
async fn migrate_file(path: &Path, store: &dyn SessionStore) -> StoreResult<bool> {
    let raw = std::fs::read_to_string(path)?;
    let legacy: LegacySession = serde_json::from_str(&raw)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

    if store.get_session(&legacy.session_id).await?.is_some() {
        return Ok(false);
    }

    let mode = legacy_mode(&legacy.mode);
    let settings = SessionSettings {
        topic: legacy.topic.clone(),
        rounds: 0,
        councilors: Vec::new(),
    };
    store
        .create_session_with_id(&legacy.session_id, &legacy.topic, mode, settings)
        .await?;

    for m in &legacy.messages {
        let role_label = if m.role.is_empty() {
            "contribution"
        } else {
            m.role.as_str()
        };
        store
            .add_message(
                &legacy.session_id,
                NewMessage::bot(&m.councilor, role_label, &m.content),
            )
            .await?;
    }

    // The legacy server stored the synthesis separately as `consensus`;
    // keep it when it is not already the last message.
    if let Some(ref consensus) = legacy.consensus {
        let duplicated = legacy
            .messages
            .last()
            .is_some_and(|m| m.content == *consensus);
        if !duplicated {
            store
                .add_message(
                    &legacy.session_id,
                    NewMessage::bot("speaker", "synthesis", consensus),
                )
                .await?;
        }
    }

    store
        .update_status(&legacy.session_id, legacy_status(&legacy.status))
        .await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_mode_mapping() {
        assert_eq!(legacy_mode("deliberation"), SessionMode::Deliberation);
        assert_eq!(legacy_mode("swarm_coding"), SessionMode::SwarmCoding);
        // Unknown legacy modes fall back to deliberation.
        assert_eq!(legacy_mode("legislative"), SessionMode::Deliberation);
    }

    #[test]
    fn test_legacy_status_mapping() {
        assert_eq!(legacy_status("completed"), SessionStatus::Completed);
        assert_eq!(legacy_status("failed"), SessionStatus::Failed);
        assert_eq!(legacy_status("running"), SessionStatus::Active);
        assert_eq!(legacy_status(""), SessionStatus::Active);
    }

    #[test]
    fn test_legacy_shape_parses() {
        let raw = r#"{
            "sessionId": "abc-123",
            "mode": "deliberation",
            "topic": "tabs or spaces",
            "status": "completed",
            "createdAt": "2024-06-01T12:00:00",
            "messages": [
                {"councilor": "speaker", "role": "opening", "content": "we convene", "timestamp": "t"}
            ],
            "consensus": "spaces"
        }"#;
        let legacy: LegacySession = serde_json::from_str(raw).unwrap();
        assert_eq!(legacy.session_id, "abc-123");
        assert_eq!(legacy.messages.len(), 1);
        assert_eq!(legacy.consensus.as_deref(), Some("spaces"));
    }
}
