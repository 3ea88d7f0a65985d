//! JSONL-backed session store.
//!
//! One append-only `<id>.jsonl` file per session: the first record is the
//! session header, every later record is a message or status event, and
//! reads replay the log. A single writer task applies all commands in
//! arrival order, which serializes appends per session; `shutdown` closes
//! the queue and joins the writer, so every queued write is flushed before
//! it returns.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::session::{Message, NewMessage, SessionMode, SessionStatus};

use super::{SessionRecord, SessionSettings, SessionStore, StoreError, StoreResult};

/// One line in a session log file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LogRecord {
    Header {
        id: String,
        title: String,
        mode: SessionMode,
        settings: SessionSettings,
        created_at: DateTime<Utc>,
    },
    Message {
        message: Message,
    },
    Status {
        status: SessionStatus,
        at: DateTime<Utc>,
    },
}

enum Command {
    Init {
        reply: oneshot::Sender<StoreResult<()>>,
    },
    Create {
        id: Option<String>,
        title: String,
        mode: SessionMode,
        settings: SessionSettings,
        initial_prompt: Option<String>,
        reply: oneshot::Sender<StoreResult<String>>,
    },
    Append {
        session_id: String,
        message: NewMessage,
        reply: oneshot::Sender<StoreResult<Message>>,
    },
    Status {
        session_id: String,
        status: SessionStatus,
        reply: oneshot::Sender<StoreResult<()>>,
    },
    Get {
        session_id: String,
        reply: oneshot::Sender<StoreResult<Option<SessionRecord>>>,
    },
    List {
        reply: oneshot::Sender<StoreResult<Vec<SessionRecord>>>,
    },
    Delete {
        session_id: String,
        reply: oneshot::Sender<StoreResult<()>>,
    },
}

/// File-backed [`SessionStore`] with a per-store writer task.
pub struct JsonlSessionStore {
    tx: Mutex<Option<mpsc::Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl JsonlSessionStore {
    /// Open a store rooted at `dir`. Spawns the writer task, so this must
    /// run inside a Tokio runtime. Call `initialize` before use.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let worker = tokio::spawn(run_writer(dir.into(), rx));
        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    async fn send<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<StoreResult<T>>) -> Command,
    ) -> StoreResult<T> {
        let tx = self
            .tx
            .lock()
            .expect("store sender lock poisoned")
            .clone()
            .ok_or(StoreError::Closed)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(make(reply_tx))
            .await
            .map_err(|_| StoreError::Closed)?;
        reply_rx.await.map_err(|_| StoreError::Closed)?
    }
}

#[async_trait::async_trait]
impl SessionStore for JsonlSessionStore {
    async fn initialize(&self) -> StoreResult<()> {
        self.send(|reply| Command::Init { reply }).await
    }

    async fn create_session(
        &self,
        title: &str,
        mode: SessionMode,
        settings: SessionSettings,
        initial_prompt: Option<&str>,
    ) -> StoreResult<String> {
        let title = title.to_string();
        let initial_prompt = initial_prompt.map(|s| s.to_string());
        self.send(move |reply| Command::Create {
            id: None,
            title,
            mode,
            settings,
            initial_prompt,
            reply,
        })
        .await
    }

    async fn create_session_with_id(
        &self,
        id: &str,
        title: &str,
        mode: SessionMode,
        settings: SessionSettings,
    ) -> StoreResult<String> {
        let id = id.to_string();
        let title = title.to_string();
        self.send(move |reply| Command::Create {
            id: Some(id),
            title,
            mode,
            settings,
            initial_prompt: None,
            reply,
        })
        .await
    }

    async fn add_message(&self, session_id: &str, message: NewMessage) -> StoreResult<Message> {
        let session_id = session_id.to_string();
        self.send(move |reply| Command::Append {
            session_id,
            message,
            reply,
        })
        .await
    }

    async fn update_status(&self, session_id: &str, status: SessionStatus) -> StoreResult<()> {
        let session_id = session_id.to_string();
        self.send(move |reply| Command::Status {
            session_id,
            status,
            reply,
        })
        .await
    }

    async fn get_session(&self, session_id: &str) -> StoreResult<Option<SessionRecord>> {
        let session_id = session_id.to_string();
        self.send(move |reply| Command::Get { session_id, reply }).await
    }

    async fn list_sessions(&self) -> StoreResult<Vec<SessionRecord>> {
        self.send(|reply| Command::List { reply }).await
    }

    async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        let session_id = session_id.to_string();
        self.send(move |reply| Command::Delete { session_id, reply })
            .await
    }

    async fn shutdown(&self) -> StoreResult<()> {
        // Dropping the sender lets the writer drain the queue and exit;
        // joining it is the durability barrier.
        let tx = self.tx.lock().expect("store sender lock poisoned").take();
        drop(tx);

        let worker = self.worker.lock().expect("store worker lock poisoned").take();
        if let Some(handle) = worker {
            handle.await.map_err(|e| {
                StoreError::Serialization(format!("writer task panicked: {}", e))
            })?;
        }
        Ok(())
    }
}

async fn run_writer(dir: PathBuf, mut rx: mpsc::Receiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Init { reply } => {
                let result = std::fs::create_dir_all(&dir).map_err(StoreError::Io);
                let _ = reply.send(result);
            }
            Command::Create {
                id,
                title,
                mode,
                settings,
                initial_prompt,
                reply,
            } => {
                let _ = reply.send(create_session(
                    &dir,
                    id,
                    &title,
                    mode,
                    settings,
                    initial_prompt.as_deref(),
                ));
            }
            Command::Append {
                session_id,
                message,
                reply,
            } => {
                let _ = reply.send(append_message(&dir, &session_id, message));
            }
            Command::Status {
                session_id,
                status,
                reply,
            } => {
                let _ = reply.send(append_status(&dir, &session_id, status));
            }
            Command::Get { session_id, reply } => {
                let _ = reply.send(read_session(&dir, &session_id));
            }
            Command::List { reply } => {
                let _ = reply.send(list_sessions(&dir));
            }
            Command::Delete { session_id, reply } => {
                let _ = reply.send(delete_session(&dir, &session_id));
            }
        }
    }
    debug!(dir = %dir.display(), "session store writer drained");
}

fn session_path(dir: &Path, id: &str) -> StoreResult<PathBuf> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(StoreError::Serialization(format!(
            "session id `{}` is not storable",
            id
        )));
    }
    Ok(dir.join(format!("{}.jsonl", id)))
}

fn write_record(path: &Path, record: &LogRecord) -> StoreResult<()> {
    let line = serde_json::to_string(record)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_all()?;
    Ok(())
}

fn create_session(
    dir: &Path,
    id: Option<String>,
    title: &str,
    mode: SessionMode,
    settings: SessionSettings,
    initial_prompt: Option<&str>,
) -> StoreResult<String> {
    std::fs::create_dir_all(dir)?;
    let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let path = session_path(dir, &id)?;
    if path.exists() {
        return Err(StoreError::SessionExists(id));
    }

    write_record(
        &path,
        &LogRecord::Header {
            id: id.clone(),
            title: title.to_string(),
            mode,
            settings,
            created_at: Utc::now(),
        },
    )?;

    if let Some(prompt) = initial_prompt {
        persist_message(&path, NewMessage::human(prompt))?;
    }
    debug!(session = %id, %mode, "session created");
    Ok(id)
}

fn persist_message(path: &Path, partial: NewMessage) -> StoreResult<Message> {
    let message = Message {
        id: Uuid::new_v4().to_string(),
        author: partial.author,
        author_kind: partial.author_kind,
        content: partial.content,
        role_label: partial.role_label,
        timestamp: Utc::now(),
    };
    write_record(
        path,
        &LogRecord::Message {
            message: message.clone(),
        },
    )?;
    Ok(message)
}

fn append_message(dir: &Path, session_id: &str, partial: NewMessage) -> StoreResult<Message> {
    let path = session_path(dir, session_id)?;
    if !path.exists() {
        return Err(StoreError::SessionNotFound(session_id.to_string()));
    }
    persist_message(&path, partial)
}

fn append_status(dir: &Path, session_id: &str, status: SessionStatus) -> StoreResult<()> {
    let path = session_path(dir, session_id)?;
    if !path.exists() {
        return Err(StoreError::SessionNotFound(session_id.to_string()));
    }
    write_record(&path, &LogRecord::Status { status, at: Utc::now() })
}

fn read_session(dir: &Path, session_id: &str) -> StoreResult<Option<SessionRecord>> {
    let path = session_path(dir, session_id)?;
    if !path.exists() {
        return Ok(None);
    }
    replay(&path).map(Some)
}

fn replay(path: &Path) -> StoreResult<SessionRecord> {
    let raw = std::fs::read_to_string(path)?;
    let mut record: Option<SessionRecord> = None;

    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: LogRecord = serde_json::from_str(line).map_err(|e| {
            StoreError::Serialization(format!(
                "{}:{}: {}",
                path.display(),
                line_no + 1,
                e
            ))
        })?;
        let malformed = || {
            StoreError::Serialization(format!("{}: malformed log structure", path.display()))
        };
        match parsed {
            LogRecord::Header {
                id,
                title,
                mode,
                settings,
                created_at,
            } => {
                if record.is_some() {
                    return Err(malformed());
                }
                record = Some(SessionRecord {
                    id,
                    title,
                    mode,
                    status: SessionStatus::Active,
                    messages: Vec::new(),
                    settings,
                    created_at,
                });
            }
            LogRecord::Message { message } => {
                record.as_mut().ok_or_else(malformed)?.messages.push(message);
            }
            LogRecord::Status { status, .. } => {
                record.as_mut().ok_or_else(malformed)?.status = status;
            }
        }
    }

    record.ok_or_else(|| {
        StoreError::Serialization(format!("{}: empty session log", path.display()))
    })
}

fn list_sessions(dir: &Path) -> StoreResult<Vec<SessionRecord>> {
    let mut sessions = Vec::new();
    if !dir.exists() {
        return Ok(sessions);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        match replay(&path) {
            Ok(session) => sessions.push(session),
            Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable session log"),
        }
    }
    sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(sessions)
}

fn delete_session(dir: &Path, session_id: &str) -> StoreResult<()> {
    let path = session_path(dir, session_id)?;
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::AuthorKind;

    fn settings() -> SessionSettings {
        SessionSettings {
            topic: "test".to_string(),
            rounds: 2,
            councilors: vec!["skeptic".to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_append_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlSessionStore::open(dir.path());
        store.initialize().await.unwrap();

        let id = store
            .create_session("Tabs", SessionMode::Deliberation, settings(), Some("topic"))
            .await
            .unwrap();

        let persisted = store
            .add_message(&id, NewMessage::bot("speaker", "opening", "we convene"))
            .await
            .unwrap();
        assert!(!persisted.id.is_empty());
        assert_eq!(persisted.author_kind, AuthorKind::Bot);

        let session = store.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.title, "Tabs");
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].author_kind, AuthorKind::Human);
        assert_eq!(session.messages[1].content, "we convene");

        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_status_updates_replay() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlSessionStore::open(dir.path());
        store.initialize().await.unwrap();

        let id = store
            .create_session("T", SessionMode::SwarmCoding, settings(), None)
            .await
            .unwrap();
        store
            .update_status(&id, SessionStatus::Completed)
            .await
            .unwrap();

        let session = store.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_session_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlSessionStore::open(dir.path());
        store.initialize().await.unwrap();
        assert!(store.get_session("nope").await.unwrap().is_none());

        let err = store
            .add_message("nope", NewMessage::system("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound(_)));
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlSessionStore::open(dir.path());
        store.initialize().await.unwrap();

        store
            .create_session_with_id("legacy-1", "T", SessionMode::Deliberation, settings())
            .await
            .unwrap();
        let err = store
            .create_session_with_id("legacy-1", "T", SessionMode::Deliberation, settings())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SessionExists(_)));
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_hostile_session_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlSessionStore::open(dir.path());
        store.initialize().await.unwrap();

        let err = store
            .create_session_with_id("../escape", "T", SessionMode::Deliberation, settings())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlSessionStore::open(dir.path());
        store.initialize().await.unwrap();

        let id = store
            .create_session("T", SessionMode::Deliberation, settings(), None)
            .await
            .unwrap();
        store.delete_session(&id).await.unwrap();
        assert!(store.get_session(&id).await.unwrap().is_none());
        // Deleting again is a no-op.
        store.delete_session(&id).await.unwrap();
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_operations_after_shutdown_fail() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlSessionStore::open(dir.path());
        store.initialize().await.unwrap();
        store.shutdown().await.unwrap();

        let err = store.list_sessions().await.unwrap_err();
        assert!(matches!(err, StoreError::Closed));
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlSessionStore::open(dir.path());
        store.initialize().await.unwrap();

        let first = store
            .create_session("first", SessionMode::Deliberation, settings(), None)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store
            .create_session("second", SessionMode::Deliberation, settings(), None)
            .await
            .unwrap();

        let sessions = store.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, second);
        assert_eq!(sessions[1].id, first);
        store.shutdown().await.unwrap();
    }
}
