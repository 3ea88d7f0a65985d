//! Knowledge base: keyword-scored snippet retrieval over a document set.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Maximum snippets returned per query.
pub const MAX_SNIPPETS: usize = 3;
/// Query tokens at or below this length are discarded before scoring.
const MIN_TOKEN_LEN: usize = 3;
/// Snippet window: characters before the matched token.
const WINDOW_BEFORE: usize = 100;
/// Snippet window: characters after the matched token.
const WINDOW_AFTER: usize = 500;

/// A searchable document. Only active documents are searched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub content: String,
    pub active: bool,
}

impl Document {
    pub fn new(title: &str, content: &str) -> Self {
        Self {
            title: title.to_string(),
            content: content.to_string(),
            active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// A bounded excerpt of a matched document, labeled with its source title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub title: String,
    pub text: String,
}

impl Snippet {
    /// Render as a labeled context line.
    pub fn labeled(&self) -> String {
        format!("[{}] {}", self.title, self.text)
    }
}

/// Process-wide document set with keyword-scored retrieval.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    documents: RwLock<Vec<Document>>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&self, doc: Document) {
        self.documents.write().expect("knowledge lock poisoned").push(doc);
    }

    pub fn document_count(&self) -> usize {
        self.documents.read().expect("knowledge lock poisoned").len()
    }

    /// Retrieve up to [`MAX_SNIPPETS`] snippets for a query.
    ///
    /// A document scores by the count of distinct query tokens (lowercase,
    /// length > 3) it contains; zero-score documents are excluded. For each
    /// winning document the snippet spans 100 characters before and 500
    /// after the first occurrence of the first matching query token,
    /// clamped to document bounds.
    pub fn search_snippets(&self, query: &str) -> Vec<Snippet> {
        let tokens = query_tokens(query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let documents = self.documents.read().expect("knowledge lock poisoned");
        let mut scored: Vec<(usize, &Document)> = documents
            .iter()
            .filter(|d| d.active)
            .filter_map(|d| {
                let content_lower = d.content.to_lowercase();
                let score = tokens.iter().filter(|t| content_lower.contains(*t)).count();
                (score > 0).then_some((score, d))
            })
            .collect();

        // Highest score first; insertion order breaks ties.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        scored
            .into_iter()
            .take(MAX_SNIPPETS)
            .filter_map(|(_, doc)| extract_snippet(doc, &tokens))
            .collect()
    }
}

/// Lowercase tokens of the query, discarding tokens of length <= 3.
fn query_tokens(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > MIN_TOKEN_LEN)
        .map(|t| t.to_string())
        .collect()
}

/// Cut the snippet window around the first occurrence of the first query
/// token present in the document.
fn extract_snippet(doc: &Document, tokens: &[String]) -> Option<Snippet> {
    let content_lower = doc.content.to_lowercase();
    let pos = tokens.iter().find_map(|t| content_lower.find(t.as_str()))?;

    // Byte offsets come from the lowercased copy; clamp them onto char
    // boundaries of the original so multi-byte content slices cleanly.
    let start = floor_boundary(&doc.content, pos.saturating_sub(WINDOW_BEFORE));
    let end = floor_boundary(&doc.content, (pos + WINDOW_AFTER).min(doc.content.len()));

    Some(Snippet {
        title: doc.title.clone(),
        text: doc.content[start..end].trim().to_string(),
    })
}

/// Largest char boundary at or below `idx`.
fn floor_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kb_with(docs: &[(&str, &str)]) -> KnowledgeBase {
        let kb = KnowledgeBase::new();
        for (title, content) in docs {
            kb.add_document(Document::new(title, content));
        }
        kb
    }

    #[test]
    fn test_short_tokens_discarded() {
        assert_eq!(query_tokens("how do we fix the api"), Vec::<String>::new());
        assert_eq!(query_tokens("orchestrator design"), vec!["orchestrator", "design"]);
    }

    #[test]
    fn test_zero_score_documents_excluded() {
        let kb = kb_with(&[
            ("Ops", "deployment and rollback procedures"),
            ("Cooking", "how to braise short ribs"),
        ]);
        let snippets = kb.search_snippets("deployment procedures");
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].title, "Ops");
    }

    #[test]
    fn test_distinct_token_scoring_orders_results() {
        let kb = kb_with(&[
            ("One", "kernel"),
            ("Both", "kernel scheduler internals"),
        ]);
        let snippets = kb.search_snippets("kernel scheduler");
        assert_eq!(snippets.len(), 2);
        // Two distinct tokens beat one, regardless of insertion order.
        assert_eq!(snippets[0].title, "Both");
    }

    #[test]
    fn test_repeated_token_counts_once() {
        let kb = kb_with(&[
            ("Spam", "kernel kernel kernel kernel"),
            ("Rich", "kernel scheduler"),
        ]);
        let snippets = kb.search_snippets("kernel scheduler");
        assert_eq!(snippets[0].title, "Rich");
    }

    #[test]
    fn test_at_most_three_results() {
        let kb = kb_with(&[
            ("A", "orchestrator notes a"),
            ("B", "orchestrator notes b"),
            ("C", "orchestrator notes c"),
            ("D", "orchestrator notes d"),
        ]);
        assert_eq!(kb.search_snippets("orchestrator").len(), MAX_SNIPPETS);
    }

    #[test]
    fn test_inactive_documents_skipped() {
        let kb = KnowledgeBase::new();
        kb.add_document(Document::new("Live", "orchestrator design"));
        kb.add_document(Document::new("Archived", "orchestrator design").inactive());
        let snippets = kb.search_snippets("orchestrator");
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].title, "Live");
    }

    #[test]
    fn test_snippet_window_clamped_to_bounds() {
        let padding = "x".repeat(300);
        let content = format!("{padding} orchestrator marker {padding}");
        let kb = kb_with(&[("Doc", &content)]);

        let snippet = &kb.search_snippets("orchestrator")[0];
        // 100 before + token + up to 500 after.
        assert!(snippet.text.len() <= WINDOW_BEFORE + WINDOW_AFTER);
        assert!(snippet.text.contains("orchestrator marker"));

        // Token at the very start: window clamps to zero cleanly.
        let kb = kb_with(&[("Doc", "orchestrator at start")]);
        let snippet = &kb.search_snippets("orchestrator")[0];
        assert_eq!(snippet.text, "orchestrator at start");
    }

    #[test]
    fn test_snippet_anchors_on_first_present_token() {
        // First query token is absent from the document; the window anchors
        // on the next token that is present.
        let content = format!("{} scheduler details here", "y".repeat(200));
        let kb = kb_with(&[("Doc", &content)]);
        let snippet = &kb.search_snippets("zeppelin scheduler")[0];
        assert!(snippet.text.contains("scheduler details"));
    }

    #[test]
    fn test_labeled_rendering() {
        let s = Snippet {
            title: "Ops".to_string(),
            text: "rollback steps".to_string(),
        };
        assert_eq!(s.labeled(), "[Ops] rollback steps");
    }

    #[test]
    fn test_case_insensitive_matching() {
        let kb = kb_with(&[("Doc", "The Orchestrator Design Record")]);
        assert_eq!(kb.search_snippets("ORCHESTRATOR").len(), 1);
    }

    #[test]
    fn test_multibyte_content_slices_cleanly() {
        let content = format!("{} orchestrator überblick", "é".repeat(120));
        let kb = kb_with(&[("Doc", &content)]);
        let snippets = kb.search_snippets("orchestrator");
        assert_eq!(snippets.len(), 1);
        assert!(snippets[0].text.contains("orchestrator"));
    }
}
