//! Session store: durable ordered log of messages per session.

pub mod file;
pub mod migrate;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{Message, NewMessage, SessionMode, SessionStatus};

pub use file::JsonlSessionStore;
pub use migrate::{migrate_legacy_sessions, MigrationReport};

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session already exists: {0}")]
    SessionExists(String),

    #[error("store is shut down")]
    Closed,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Snapshot of session settings taken at creation time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSettings {
    pub topic: String,
    pub rounds: u32,
    /// Councilor persona ids in turn order.
    pub councilors: Vec<String>,
}

/// The logical session schema: header plus the ordered message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub title: String,
    pub mode: SessionMode,
    pub status: SessionStatus,
    /// Append-only; insertion order is conversational order.
    pub messages: Vec<Message>,
    pub settings: SessionSettings,
    pub created_at: DateTime<Utc>,
}

/// Durable ordered log of messages per session.
///
/// Implementations must serialize appends per session so overlapping writes
/// from different code paths cannot corrupt transcript order, and
/// `shutdown` must block until all pending writes are durably flushed.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Await store readiness (directories, indexes).
    async fn initialize(&self) -> StoreResult<()>;

    /// Create a session with a store-assigned id, optionally seeding an
    /// initial human prompt message. The session starts `Active`.
    async fn create_session(
        &self,
        title: &str,
        mode: SessionMode,
        settings: SessionSettings,
        initial_prompt: Option<&str>,
    ) -> StoreResult<String>;

    /// Create a session preserving a caller-assigned id. Used by legacy
    /// migration; fails if the id already exists.
    async fn create_session_with_id(
        &self,
        id: &str,
        title: &str,
        mode: SessionMode,
        settings: SessionSettings,
    ) -> StoreResult<String>;

    /// Append a message; the store assigns id and timestamp.
    async fn add_message(&self, session_id: &str, message: NewMessage) -> StoreResult<Message>;

    /// Record a status change for the session.
    async fn update_status(&self, session_id: &str, status: SessionStatus) -> StoreResult<()>;

    /// Fetch a full session, or `None` when absent.
    async fn get_session(&self, session_id: &str) -> StoreResult<Option<SessionRecord>>;

    /// All sessions, newest first.
    async fn list_sessions(&self) -> StoreResult<Vec<SessionRecord>>;

    /// Delete a session and its whole message log.
    async fn delete_session(&self, session_id: &str) -> StoreResult<()>;

    /// Drain every pending write to durable storage and release resources.
    async fn shutdown(&self) -> StoreResult<()>;
}
