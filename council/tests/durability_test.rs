//! Durability and migration tests for the file-backed session store.

use std::path::Path;

use council::{
    migrate_legacy_sessions, JsonlSessionStore, NewMessage, SessionMode, SessionSettings,
    SessionStatus, SessionStore,
};

fn settings(topic: &str) -> SessionSettings {
    SessionSettings {
        topic: topic.to_string(),
        rounds: 1,
        councilors: vec!["skeptic".to_string()],
    }
}

#[tokio::test]
async fn test_round_trip_durability_across_reinitialize() {
    let dir = tempfile::tempdir().unwrap();

    // First lifetime: create, append one message beyond the initial
    // prompt, and shut down (the drain barrier).
    let store = JsonlSessionStore::open(dir.path());
    store.initialize().await.unwrap();
    let id = store
        .create_session(
            "durability",
            SessionMode::Deliberation,
            settings("durability"),
            Some("the initial prompt"),
        )
        .await
        .unwrap();
    let last_content = "final words, byte for byte \u{00e9}";
    store
        .add_message(&id, NewMessage::bot("speaker", "opening", last_content))
        .await
        .unwrap();
    store.shutdown().await.unwrap();

    // Second lifetime: a fresh store over the same directory.
    let reopened = JsonlSessionStore::open(dir.path());
    reopened.initialize().await.unwrap();
    let session = reopened.get_session(&id).await.unwrap().unwrap();

    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[1].content, last_content);
    assert_eq!(session.title, "durability");
    reopened.shutdown().await.unwrap();
}

fn write_legacy_files(dir: &Path) {
    std::fs::write(
        dir.join("session-a.json"),
        r#"{
            "sessionId": "legacy-a",
            "mode": "deliberation",
            "topic": "tabs or spaces",
            "status": "completed",
            "createdAt": "2024-06-01T12:00:00",
            "messages": [
                {"councilor": "speaker", "role": "opening", "content": "we convene", "timestamp": "t1"},
                {"councilor": "skeptic", "role": "contribution", "content": "prove it", "timestamp": "t2"}
            ],
            "consensus": "spaces win"
        }"#,
    )
    .unwrap();

    std::fs::write(
        dir.join("session-b.json"),
        r#"{
            "sessionId": "legacy-b",
            "mode": "swarm",
            "topic": "build a parser",
            "status": "running",
            "createdAt": "2024-06-02T12:00:00",
            "messages": []
        }"#,
    )
    .unwrap();

    std::fs::write(dir.join("session-c.json"), "{ not json at all").unwrap();
}

#[tokio::test]
async fn test_migration_idempotent_and_corruption_counted() {
    let legacy_dir = tempfile::tempdir().unwrap();
    let store_dir = tempfile::tempdir().unwrap();
    write_legacy_files(legacy_dir.path());

    let store = JsonlSessionStore::open(store_dir.path());
    store.initialize().await.unwrap();

    let first = migrate_legacy_sessions(legacy_dir.path(), &store).await.unwrap();
    assert_eq!(first.migrated, 2);
    assert_eq!(first.skipped, 0);
    assert_eq!(first.failed, 1);

    // Re-running migrates nothing new and duplicates nothing.
    let second = migrate_legacy_sessions(legacy_dir.path(), &store).await.unwrap();
    assert_eq!(second.migrated, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(second.failed, 1);

    let sessions = store.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 2);

    let a = store.get_session("legacy-a").await.unwrap().unwrap();
    // Two legacy messages plus the consensus synthesis.
    assert_eq!(a.messages.len(), 3);
    assert_eq!(a.messages[2].role_label, "synthesis");
    assert_eq!(a.messages[2].content, "spaces win");
    assert_eq!(a.status, SessionStatus::Completed);
    assert_eq!(a.mode, SessionMode::Deliberation);

    let b = store.get_session("legacy-b").await.unwrap().unwrap();
    assert!(b.messages.is_empty());
    // A mid-flight legacy session keeps its non-terminal status.
    assert_eq!(b.status, SessionStatus::Active);
    assert_eq!(b.mode, SessionMode::SwarmCoding);

    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_migration_of_missing_directory_is_empty_report() {
    let store_dir = tempfile::tempdir().unwrap();
    let store = JsonlSessionStore::open(store_dir.path());
    store.initialize().await.unwrap();

    let report = migrate_legacy_sessions(Path::new("/nonexistent/legacy"), &store)
        .await
        .unwrap();
    assert_eq!(report.migrated, 0);
    assert_eq!(report.failed, 0);
    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_delete_session_removes_whole_log() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlSessionStore::open(dir.path());
    store.initialize().await.unwrap();

    let id = store
        .create_session("t", SessionMode::Deliberation, settings("t"), Some("p"))
        .await
        .unwrap();
    store.delete_session(&id).await.unwrap();
    assert!(store.get_session(&id).await.unwrap().is_none());
    assert!(store.list_sessions().await.unwrap().is_empty());
    store.shutdown().await.unwrap();
}
