//! Memory stores: global precedent memories and per-persona memories.
//!
//! Both stores are process-wide, read-mostly resources shared across
//! concurrent sessions behind `Arc`; interior locking keeps the mutation
//! surface `&self`.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A global precedent memory, matched against the session topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub topic: String,
    pub tags: Vec<String>,
    pub content: String,
}

impl MemoryEntry {
    pub fn new(topic: &str, tags: &[&str], content: &str) -> Self {
        Self {
            topic: topic.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            content: content.to_string(),
        }
    }

    fn matches(&self, query_lower: &str) -> bool {
        self.topic.to_lowercase().contains(query_lower)
            || self.content.to_lowercase().contains(query_lower)
            || self
                .tags
                .iter()
                .any(|t| t.to_lowercase().contains(query_lower))
    }
}

/// Global memory store, keyword-searchable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<Vec<MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_memory(&self, entry: MemoryEntry) {
        self.entries.write().expect("memory lock poisoned").push(entry);
    }

    /// Case-insensitive substring match on topic, tags, and content.
    pub fn search_memories(&self, query: &str) -> Vec<MemoryEntry> {
        let query_lower = query.to_lowercase();
        self.entries
            .read()
            .expect("memory lock poisoned")
            .iter()
            .filter(|e| e.matches(&query_lower))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("memory lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Kind of a per-persona memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotMemoryKind {
    Fact,
    Directive,
    Observation,
}

impl std::fmt::Display for BotMemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fact => write!(f, "fact"),
            Self::Directive => write!(f, "directive"),
            Self::Observation => write!(f, "observation"),
        }
    }
}

/// A memory scoped to one persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotMemory {
    pub persona_id: String,
    pub content: String,
    pub kind: BotMemoryKind,
    pub created_at: DateTime<Utc>,
}

/// Per-persona memory store.
///
/// Directives are unconditionally relevant; facts and observations are
/// surfaced only on a keyword match (substring in either direction).
#[derive(Debug, Default)]
pub struct BotMemoryStore {
    entries: RwLock<Vec<BotMemory>>,
}

impl BotMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_memory(&self, persona_id: &str, content: &str, kind: BotMemoryKind) {
        self.entries
            .write()
            .expect("bot memory lock poisoned")
            .push(BotMemory {
                persona_id: persona_id.to_string(),
                content: content.to_string(),
                kind,
                created_at: Utc::now(),
            });
    }

    /// All directives for a persona, in insertion order.
    pub fn directives(&self, persona_id: &str) -> Vec<String> {
        self.entries
            .read()
            .expect("bot memory lock poisoned")
            .iter()
            .filter(|m| m.persona_id == persona_id && m.kind == BotMemoryKind::Directive)
            .map(|m| m.content.clone())
            .collect()
    }

    /// Formatted context block for one persona and query, or empty when
    /// nothing is relevant.
    pub fn search_context(&self, persona_id: &str, query: &str) -> String {
        let query_lower = query.to_lowercase();
        let entries = self.entries.read().expect("bot memory lock poisoned");

        let mut directives = Vec::new();
        let mut notes = Vec::new();
        for m in entries.iter().filter(|m| m.persona_id == persona_id) {
            match m.kind {
                BotMemoryKind::Directive => directives.push(m.content.clone()),
                BotMemoryKind::Fact | BotMemoryKind::Observation => {
                    let content_lower = m.content.to_lowercase();
                    if content_lower.contains(&query_lower)
                        || query_lower.contains(&content_lower)
                    {
                        notes.push(format!("[{}] {}", m.kind, m.content));
                    }
                }
            }
        }

        if directives.is_empty() && notes.is_empty() {
            return String::new();
        }

        let mut block = String::new();
        if !directives.is_empty() {
            block.push_str("Directives:\n");
            for d in &directives {
                block.push_str(&format!("- {}\n", d));
            }
        }
        if !notes.is_empty() {
            block.push_str("Relevant notes:\n");
            for n in &notes {
                block.push_str(&format!("- {}\n", n));
            }
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_search_matches_topic_tags_content() {
        let store = MemoryStore::new();
        store.save_memory(MemoryEntry::new("Rust safety", &["memory"], "borrow checker"));
        store.save_memory(MemoryEntry::new("Gardening", &["plants"], "tomato rotation"));

        assert_eq!(store.search_memories("rust").len(), 1);
        assert_eq!(store.search_memories("PLANTS").len(), 1);
        assert_eq!(store.search_memories("checker").len(), 1);
        assert_eq!(store.search_memories("quantum").len(), 0);
    }

    #[test]
    fn test_global_search_empty_query_matches_all() {
        let store = MemoryStore::new();
        store.save_memory(MemoryEntry::new("a", &[], "x"));
        store.save_memory(MemoryEntry::new("b", &[], "y"));
        assert_eq!(store.search_memories("").len(), 2);
    }

    #[test]
    fn test_directives_always_present() {
        let store = BotMemoryStore::new();
        store.add_memory("skeptic", "Always demand sources.", BotMemoryKind::Directive);
        store.add_memory("skeptic", "The 2024 audit found gaps.", BotMemoryKind::Fact);

        // Directive appears for an unrelated query and for the empty query.
        for query in ["underwater basket weaving", ""] {
            let block = store.search_context("skeptic", query);
            assert!(block.contains("Always demand sources."), "query={:?}", query);
        }
    }

    #[test]
    fn test_facts_match_substring_either_direction() {
        let store = BotMemoryStore::new();
        store.add_memory("skeptic", "audit", BotMemoryKind::Fact);
        store.add_memory("skeptic", "the 2024 security audit report", BotMemoryKind::Observation);

        // Memory contained in query.
        let block = store.search_context("skeptic", "Discuss the audit findings");
        assert!(block.contains("[fact] audit"));

        // Query contained in memory.
        let block = store.search_context("skeptic", "security audit");
        assert!(block.contains("[observation] the 2024 security audit report"));
    }

    #[test]
    fn test_unrelated_facts_excluded() {
        let store = BotMemoryStore::new();
        store.add_memory("skeptic", "tomato rotation schedule", BotMemoryKind::Fact);
        let block = store.search_context("skeptic", "rust ownership");
        assert!(block.is_empty());
    }

    #[test]
    fn test_context_scoped_to_persona() {
        let store = BotMemoryStore::new();
        store.add_memory("skeptic", "Demand evidence.", BotMemoryKind::Directive);
        assert!(store.search_context("visionary", "anything").is_empty());
        assert_eq!(store.directives("skeptic"), vec!["Demand evidence.".to_string()]);
        assert!(store.directives("visionary").is_empty());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(BotMemoryKind::Fact.to_string(), "fact");
        assert_eq!(BotMemoryKind::Directive.to_string(), "directive");
        assert_eq!(BotMemoryKind::Observation.to_string(), "observation");
    }
}
