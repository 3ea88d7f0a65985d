//! Instruction text for each persona role and session mode.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever instruction content
//! changes, so a transcript can be traced back to the instructions that
//! produced it.

use crate::envelope::{COMPLETION_MARKER, TOOL_CALL_TAG};
use crate::persona::PersonaRole;
use crate::session::SessionMode;

/// Prompt version. Bump on any instruction content change.
pub const PROMPT_VERSION: &str = "1.0.0";

/// Generic role instructions, used when a persona carries no character
/// instructions of its own.
pub fn role_instructions(role: PersonaRole) -> &'static str {
    match role {
        PersonaRole::Speaker => {
            "You are the Speaker of the Council: a balanced facilitator who frames \
             discussions and synthesizes perspectives."
        }
        PersonaRole::Moderator => {
            "You are the Moderator of the Council. You keep discussion balanced and \
             produce the final synthesis from all contributions."
        }
        PersonaRole::Councilor => {
            "You are a Councilor. Contribute your distinct perspective on the matter \
             under discussion."
        }
        PersonaRole::Specialist => {
            "You are a Specialist advisor to the Council. Contribute your domain \
             expertise on the matter under discussion."
        }
    }
}

/// Mode-specific instructions appended after the persona character.
pub fn mode_instructions(mode: SessionMode) -> String {
    match mode {
        SessionMode::Deliberation => {
            "The Council is holding an open deliberation. Keep your response concise \
             (2-3 sentences) and build on prior contributions."
                .to_string()
        }
        SessionMode::SwarmCoding => format!(
            "The Council is collaboratively building a code artifact. Build directly \
             on the artifact state in the transcript. When the artifact is complete \
             and needs no further changes, include a line containing exactly \
             {COMPLETION_MARKER} in your response."
        ),
        SessionMode::Inquiry => {
            "You are addressing a direct inquiry. Provide a thoughtful, self-contained \
             answer from your perspective."
                .to_string()
        }
    }
}

/// How to request a tool, appended when tools are available to the turn.
pub fn tool_protocol_instructions(definitions_block: &str) -> String {
    format!(
        "{definitions_block}\
         To call a tool, reply with a line containing only `{TOOL_CALL_TAG}` followed \
         by a JSON object: {TOOL_CALL_TAG} {{\"name\": \"<tool>\", \"arguments\": {{...}}}}. \
         Reply with nothing else in that turn. Otherwise answer in plain text."
    )
}

/// Task line for the speaker's opening statement.
pub fn opening_task(topic: &str) -> String {
    format!(
        "The Council convenes to discuss: {topic}\n\n\
         Provide a brief opening statement framing the discussion for the Council."
    )
}

/// Task line for a councilor's round contribution.
pub fn contribution_task(topic: &str) -> String {
    format!(
        "The Council is discussing: {topic}\n\n\
         Provide your perspective on this matter."
    )
}

/// Task line for the moderator's synthesis.
pub fn synthesis_task(topic: &str) -> String {
    format!(
        "The Council has discussed: {topic}\n\n\
         Provide a synthesis of the Council's deliberation and a recommendation."
    )
}

/// Task line for a direct inquiry.
pub fn inquiry_task(question: &str) -> String {
    format!(
        "You are addressing the Council with the following inquiry:\n\n{question}\n\n\
         Provide a thoughtful response based on your perspective."
    )
}

/// Follow-up task after a tool result lands in the transcript.
pub fn tool_followup_task(final_answer_required: bool) -> &'static str {
    if final_answer_required {
        "The tool result is recorded above. Tool calls are no longer available \
         this turn; provide your final response in plain text."
    } else {
        "The tool result is recorded above. Continue your turn: call another \
         tool if needed, or provide your final response in plain text."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_role_has_instructions() {
        for role in [
            PersonaRole::Speaker,
            PersonaRole::Moderator,
            PersonaRole::Councilor,
            PersonaRole::Specialist,
        ] {
            assert!(!role_instructions(role).is_empty());
        }
    }

    #[test]
    fn test_swarm_instructions_name_the_marker() {
        assert!(mode_instructions(SessionMode::SwarmCoding).contains(COMPLETION_MARKER));
        assert!(!mode_instructions(SessionMode::Deliberation).contains(COMPLETION_MARKER));
    }

    #[test]
    fn test_tool_protocol_names_the_tag() {
        let block = tool_protocol_instructions("Available tools:\n- read_file: ...\n");
        assert!(block.contains(TOOL_CALL_TAG));
        assert!(block.contains("read_file"));
    }

    #[test]
    fn test_task_lines_carry_topic() {
        assert!(opening_task("tabs or spaces").contains("tabs or spaces"));
        assert!(contribution_task("tabs or spaces").contains("tabs or spaces"));
        assert!(synthesis_task("tabs or spaces").contains("tabs or spaces"));
        assert!(inquiry_task("why?").contains("why?"));
    }
}
