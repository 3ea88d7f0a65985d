//! Session state machine: phases, transitions, messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operating mode of a council session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Fixed-round discussion ending in moderator synthesis.
    Deliberation,
    /// Open-ended collaborative rounds ending on a completion signal or cap.
    SwarmCoding,
    /// Single-turn question to one persona.
    Inquiry,
}

impl SessionMode {
    /// Whether the roster may be augmented with dynamically suggested
    /// personas.
    pub fn allows_dynamic_personas(self) -> bool {
        matches!(self, Self::Deliberation | Self::SwarmCoding)
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deliberation => write!(f, "deliberation"),
            Self::SwarmCoding => write!(f, "swarm_coding"),
            Self::Inquiry => write!(f, "inquiry"),
        }
    }
}

impl std::str::FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deliberation" => Ok(Self::Deliberation),
            "swarm_coding" | "swarm" => Ok(Self::SwarmCoding),
            "inquiry" => Ok(Self::Inquiry),
            other => Err(format!("unknown session mode `{}`", other)),
        }
    }
}

/// Terminal-visible status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Kind of message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorKind {
    Human,
    Bot,
    System,
    Tool,
}

/// A persisted transcript message. Never reordered or edited after append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned identifier.
    pub id: String,
    /// Persona id, tool name, or human/system marker.
    pub author: String,
    pub author_kind: AuthorKind,
    pub content: String,
    /// Conversational role label: "opening", "contribution", "synthesis",
    /// "tool_call", "tool_result", "system", "prompt".
    pub role_label: String,
    /// Store-assigned append time.
    pub timestamp: DateTime<Utc>,
}

/// A message before the store assigns id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub author: String,
    pub author_kind: AuthorKind,
    pub content: String,
    pub role_label: String,
}

impl NewMessage {
    pub fn bot(author: &str, role_label: &str, content: &str) -> Self {
        Self {
            author: author.to_string(),
            author_kind: AuthorKind::Bot,
            content: content.to_string(),
            role_label: role_label.to_string(),
        }
    }

    pub fn human(content: &str) -> Self {
        Self {
            author: "human".to_string(),
            author_kind: AuthorKind::Human,
            content: content.to_string(),
            role_label: "prompt".to_string(),
        }
    }

    pub fn system(content: &str) -> Self {
        Self {
            author: "system".to_string(),
            author_kind: AuthorKind::System,
            content: content.to_string(),
            role_label: "system".to_string(),
        }
    }

    pub fn tool(tool_name: &str, content: &str) -> Self {
        Self {
            author: tool_name.to_string(),
            author_kind: AuthorKind::Tool,
            content: content.to_string(),
            role_label: "tool_result".to_string(),
        }
    }
}

/// Phase of the council state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouncilPhase {
    /// Session created in the store, marked active.
    Init,
    /// Speaker produces the opening statement.
    Opening,
    /// Councilors take turns in roster order.
    Round,
    /// Moderator synthesis, or the last contribution stands.
    Synthesis,
    /// Status committed as completed.
    Complete,
    /// Assembly-fatal or persistence-fatal terminal state.
    Failed,
}

impl CouncilPhase {
    /// Whether this is a terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Valid transitions from this phase. `Failed` is reachable from every
    /// non-terminal phase.
    pub fn valid_transitions(self) -> &'static [CouncilPhase] {
        match self {
            Self::Init => &[Self::Opening, Self::Failed],
            Self::Opening => &[Self::Round, Self::Synthesis, Self::Complete, Self::Failed],
            Self::Round => &[Self::Round, Self::Synthesis, Self::Complete, Self::Failed],
            Self::Synthesis => &[Self::Complete, Self::Failed],
            Self::Complete | Self::Failed => &[],
        }
    }
}

impl std::fmt::Display for CouncilPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Opening => write!(f, "opening"),
            Self::Round => write!(f, "round"),
            Self::Synthesis => write!(f, "synthesis"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A recorded phase transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: CouncilPhase,
    pub to: CouncilPhase,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Error for invalid phase transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: CouncilPhase,
    pub to: CouncilPhase,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid transition {} -> {} (allowed: {:?})",
            self.from,
            self.to,
            self.from.valid_transitions()
        )
    }
}

impl std::error::Error for TransitionError {}

/// In-memory tracker for one running session's state machine.
///
/// The durable transcript lives exclusively in the session store; this
/// tracker holds only the store id plus phase/round bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilSession {
    /// Store-assigned session id.
    pub id: String,
    pub topic: String,
    pub mode: SessionMode,
    pub phase: CouncilPhase,
    /// Current round number (1-indexed; 0 before the first round).
    pub current_round: u32,
    pub max_rounds: u32,
    pub transitions: Vec<PhaseTransition>,
    pub created_at: DateTime<Utc>,
}

impl CouncilSession {
    pub fn new(id: &str, topic: &str, mode: SessionMode, max_rounds: u32) -> Self {
        Self {
            id: id.to_string(),
            topic: topic.to_string(),
            mode,
            phase: CouncilPhase::Init,
            current_round: 0,
            max_rounds,
            transitions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Transition to a new phase, recording the reason.
    ///
    /// Entering `Round` increments the round counter.
    pub fn transition(&mut self, to: CouncilPhase, reason: &str) -> Result<(), TransitionError> {
        if !self.phase.valid_transitions().contains(&to) {
            return Err(TransitionError {
                from: self.phase,
                to,
            });
        }

        self.transitions.push(PhaseTransition {
            from: self.phase,
            to,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        });
        self.phase = to;

        if to == CouncilPhase::Round {
            self.current_round += 1;
        }
        Ok(())
    }

    /// Whether the session reached a terminal phase.
    pub fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Whether another round may start.
    pub fn has_rounds_remaining(&self) -> bool {
        self.current_round < self.max_rounds
    }

    /// Compact status line for logs.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] round {}/{} | mode={} | session={}",
            self.phase, self.current_round, self.max_rounds, self.mode, self.id
        )
    }
}
