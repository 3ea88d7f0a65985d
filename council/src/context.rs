//! Context assembly: the immutable prompt snapshot for one invocation.
//!
//! Pure and read-only: the assembler reads the shared stores but mutates
//! nothing, so concurrent sessions can share one instance.

use std::sync::Arc;

use crate::knowledge::KnowledgeBase;
use crate::memory::{BotMemoryStore, MemoryStore};
use crate::persona::PersonaConfig;
use crate::prompts;
use crate::provider::ChatMessage;
use crate::session::{Message, SessionMode};

/// Immutable context snapshot handed to the provider for one turn.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub system: String,
    pub user: String,
}

impl TurnContext {
    /// Render as provider chat messages.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(&self.system),
            ChatMessage::user(&self.user),
        ]
    }
}

/// Builds turn contexts from the shared read-mostly stores.
pub struct ContextAssembler {
    memory: Arc<MemoryStore>,
    bot_memory: Arc<BotMemoryStore>,
    knowledge: Arc<KnowledgeBase>,
    transcript_budget_chars: usize,
}

impl ContextAssembler {
    pub fn new(
        memory: Arc<MemoryStore>,
        bot_memory: Arc<BotMemoryStore>,
        knowledge: Arc<KnowledgeBase>,
        transcript_budget_chars: usize,
    ) -> Self {
        Self {
            memory,
            bot_memory,
            knowledge,
            transcript_budget_chars,
        }
    }

    /// Context for the opening statement: topic and directive memories
    /// only, no prior transcript, no retrieval.
    pub fn assemble_opening(
        &self,
        persona: &PersonaConfig,
        mode: SessionMode,
        task: &str,
    ) -> TurnContext {
        let mut user = String::new();
        let directives = self.bot_memory.directives(&persona.id);
        if !directives.is_empty() {
            user.push_str("Directives:\n");
            for d in &directives {
                user.push_str(&format!("- {}\n", d));
            }
            user.push('\n');
        }
        user.push_str(task);

        TurnContext {
            system: self.instruction_block(persona, mode, None),
            user,
        }
    }

    /// Full context for a round turn: instruction block, truncated
    /// transcript, matching global memories, persona memories, and up to
    /// three knowledge snippets.
    pub fn assemble(
        &self,
        persona: &PersonaConfig,
        mode: SessionMode,
        topic: &str,
        transcript: &[Message],
        tool_block: Option<&str>,
        task: &str,
    ) -> TurnContext {
        let mut user = String::new();

        let precedents = self.memory.search_memories(topic);
        if !precedents.is_empty() {
            user.push_str("Council precedents:\n");
            for p in &precedents {
                user.push_str(&format!("- [{}] {}\n", p.topic, p.content));
            }
            user.push('\n');
        }

        let persona_block = self.bot_memory.search_context(&persona.id, topic);
        if !persona_block.is_empty() {
            user.push_str(&persona_block);
            user.push('\n');
        }

        let snippets = self.knowledge.search_snippets(topic);
        if !snippets.is_empty() {
            user.push_str("Reference material:\n");
            for s in &snippets {
                user.push_str(&format!("{}\n", s.labeled()));
            }
            user.push('\n');
        }

        if !transcript.is_empty() {
            user.push_str("Transcript:\n");
            user.push_str(&truncate_transcript(transcript, self.transcript_budget_chars));
            user.push('\n');
        }

        user.push_str(task);

        TurnContext {
            system: self.instruction_block(persona, mode, tool_block),
            user,
        }
    }

    fn instruction_block(
        &self,
        persona: &PersonaConfig,
        mode: SessionMode,
        tool_block: Option<&str>,
    ) -> String {
        let character = persona
            .instructions
            .as_deref()
            .unwrap_or_else(|| prompts::role_instructions(persona.role));

        let mut block = format!("{}\n\n{}", character, prompts::mode_instructions(mode));
        if let Some(tools) = tool_block {
            if !tools.is_empty() {
                block.push_str("\n\n");
                block.push_str(&prompts::tool_protocol_instructions(tools));
            }
        }
        block
    }
}

/// Render a transcript within a character budget, keeping the most recent
/// messages and dropping the oldest first. A marker records the cut.
pub fn truncate_transcript(messages: &[Message], budget_chars: usize) -> String {
    let lines: Vec<String> = messages
        .iter()
        .map(|m| format!("{} ({}): {}", m.author, m.role_label, m.content))
        .collect();

    let mut kept = 0usize;
    let mut used = 0usize;
    for line in lines.iter().rev() {
        let cost = line.len() + 1;
        if kept > 0 && used + cost > budget_chars {
            break;
        }
        used += cost;
        kept += 1;
    }

    let omitted = lines.len() - kept;
    let mut out = String::new();
    if omitted > 0 {
        out.push_str(&format!("[...{} earlier messages omitted...]\n", omitted));
    }
    for line in &lines[omitted..] {
        out.push_str(line);
        out.push('\n');
    }
    out
}
