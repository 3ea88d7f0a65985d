//! Tagged turn envelopes: strict parsing of model output.
//!
//! A persona turn is either plain text, a tool call, or a tool result.
//! The grammar is deliberately rigid; anything that does not match parses
//! as plain text, so a malformed tag can never crash a turn.
//!
//! Grammar:
//!
//! ```text
//! turn        ::= tool-call | tool-result | plain
//! tool-call   ::= "@@tool" json-object          ; {"name": "...", "arguments": {...}}
//! tool-result ::= "@@tool_result" json-object   ; {"name": "...", "output": "..."}
//! plain       ::= any other text
//! ```
//!
//! The tag must be the first non-whitespace token of the response; the
//! remainder (same line and following lines) must be one valid JSON object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag opening a tool-call envelope.
pub const TOOL_CALL_TAG: &str = "@@tool";
/// Tag opening a tool-result envelope.
pub const TOOL_RESULT_TAG: &str = "@@tool_result";
/// Exact line signalling swarm-coding completion inside a plain turn.
pub const COMPLETION_MARKER: &str = "[COUNCIL_COMPLETE]";

#[derive(Debug, Deserialize)]
struct ToolCallBody {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ToolResultBody {
    name: String,
    output: String,
}

/// A parsed persona turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEnvelope {
    Plain { text: String },
    ToolCall { name: String, arguments: Value },
    ToolResult { name: String, output: String },
}

impl TurnEnvelope {
    /// Parse a raw model response. Never fails; deviations from the tagged
    /// grammar degrade to `Plain`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim_start();

        // `@@tool_result` must be checked first: `@@tool` is its prefix.
        if let Some(rest) = tagged_body(trimmed, TOOL_RESULT_TAG) {
            if let Ok(body) = serde_json::from_str::<ToolResultBody>(rest) {
                return Self::ToolResult {
                    name: body.name,
                    output: body.output,
                };
            }
            return Self::plain(raw);
        }

        if let Some(rest) = tagged_body(trimmed, TOOL_CALL_TAG) {
            if let Ok(body) = serde_json::from_str::<ToolCallBody>(rest) {
                let arguments = if body.arguments.is_null() {
                    Value::Object(serde_json::Map::new())
                } else {
                    body.arguments
                };
                return Self::ToolCall {
                    name: body.name,
                    arguments,
                };
            }
            return Self::plain(raw);
        }

        Self::plain(raw)
    }

    fn plain(raw: &str) -> Self {
        Self::Plain {
            text: raw.trim().to_string(),
        }
    }

    /// Whether this turn carries the swarm-coding completion signal: a
    /// plain turn with one line exactly equal to the marker.
    pub fn signals_completion(&self) -> bool {
        match self {
            Self::Plain { text } => text.lines().any(|l| l.trim() == COMPLETION_MARKER),
            _ => false,
        }
    }

    /// Render the envelope back to wire form (used to feed tool results
    /// into the follow-up context).
    pub fn render(&self) -> String {
        match self {
            Self::Plain { text } => text.clone(),
            Self::ToolCall { name, arguments } => format!(
                "{} {}",
                TOOL_CALL_TAG,
                serde_json::json!({ "name": name, "arguments": arguments })
            ),
            Self::ToolResult { name, output } => format!(
                "{} {}",
                TOOL_RESULT_TAG,
                serde_json::json!({ "name": name, "output": output })
            ),
        }
    }
}

/// If `text` starts with `tag` followed by whitespace (or a brace), return
/// the remainder after the tag.
fn tagged_body<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(tag)?;
    match rest.chars().next() {
        Some(c) if c.is_whitespace() || c == '{' => Some(rest),
        // Bare tag with no body still claims the envelope (and will fail
        // JSON parsing, degrading to plain).
        None => Some(rest),
        // e.g. `@@toolbox` is not a tag.
        Some(_) => None,
    }
}
