//! Council orchestrator: drives a session through the round state machine.
//!
//! Resolves the roster, runs opening/rounds/synthesis, assembles per-turn
//! context, executes the bounded tool loop, and commits every produced
//! message through the session store. One persona's outage never aborts a
//! session; whole-session failure is reserved for roster assembly and
//! store writes.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CouncilConfig;
use crate::context::{ContextAssembler, TurnContext};
use crate::envelope::TurnEnvelope;
use crate::error::CouncilError;
use crate::persona::PersonaConfig;
use crate::prompts;
use crate::provider::{ProviderClient, ProviderError};
use crate::roster::{resolve_roster, Roster};
use crate::session::{
    CouncilPhase, CouncilSession, Message, NewMessage, SessionMode, SessionStatus, TransitionError,
};
use crate::store::{SessionSettings, SessionStore, StoreError};
use crate::suggest::PersonaSuggestionService;
use crate::tools::ToolRegistry;

/// Input for one council session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub topic: String,
    pub mode: SessionMode,
    /// Full persona list; roster resolution filters and orders it.
    pub personas: Vec<PersonaConfig>,
    /// Inquiry mode only: persona id to address. Defaults to the speaker.
    pub addressed_persona: Option<String>,
}

impl SessionRequest {
    pub fn new(topic: &str, mode: SessionMode, personas: Vec<PersonaConfig>) -> Self {
        Self {
            topic: topic.to_string(),
            mode,
            personas,
            addressed_persona: None,
        }
    }

    pub fn addressed_to(mut self, persona_id: &str) -> Self {
        self.addressed_persona = Some(persona_id.to_string());
        self
    }
}

/// Outcome of a completed session run.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: String,
    pub status: SessionStatus,
    pub terminal_phase: CouncilPhase,
    pub rounds_completed: u32,
    /// Synthesis text, or the last contribution when no moderator spoke.
    pub result: Option<String>,
    /// Personas skipped after exhausting provider retries.
    pub skipped_personas: Vec<String>,
    /// Whether the run ended on a cancellation request.
    pub cancelled: bool,
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// Compact summary line.
    pub fn summary_line(&self) -> String {
        format!(
            "[{}] {} rounds | skipped={} | session={}",
            self.status,
            self.rounds_completed,
            self.skipped_personas.len(),
            self.session_id
        )
    }
}

/// Internal failure inside a running session. Both variants mark the
/// session `Failed`; neither escapes `run_session` as an `Err`.
#[derive(Debug)]
enum DriveError {
    Store(StoreError),
    Transition(TransitionError),
}

impl std::fmt::Display for DriveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store write failed: {}", e),
            Self::Transition(e) => write!(f, "{}", e),
        }
    }
}

impl From<StoreError> for DriveError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<TransitionError> for DriveError {
    fn from(e: TransitionError) -> Self {
        Self::Transition(e)
    }
}

/// Mutable bookkeeping for one run, private to the orchestrator. Personas
/// only ever see immutable context snapshots derived from it.
struct RunState {
    transcript: Vec<Message>,
    skipped: Vec<String>,
    result: Option<String>,
    swarm_complete: bool,
    cancelled: bool,
}

impl RunState {
    fn new() -> Self {
        Self {
            transcript: Vec::new(),
            skipped: Vec::new(),
            result: None,
            swarm_complete: false,
            cancelled: false,
        }
    }
}

/// The council orchestrator. Collaborators are constructed by the
/// composition root and shared by reference; the orchestrator owns no
/// global state.
pub struct CouncilOrchestrator {
    config: CouncilConfig,
    store: Arc<dyn SessionStore>,
    provider: Arc<dyn ProviderClient>,
    registry: Arc<ToolRegistry>,
    assembler: ContextAssembler,
    suggester: Arc<dyn PersonaSuggestionService>,
}

impl CouncilOrchestrator {
    pub fn new(
        config: CouncilConfig,
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn ProviderClient>,
        registry: Arc<ToolRegistry>,
        assembler: ContextAssembler,
        suggester: Arc<dyn PersonaSuggestionService>,
    ) -> Self {
        Self {
            config,
            store,
            provider,
            registry,
            assembler,
            suggester,
        }
    }

    /// Run a session to a terminal state.
    ///
    /// The only thrown faults are `Configuration` (roster assembly) and
    /// `Persistence` when the session cannot even be created; every later
    /// failure is reflected in session status plus a SYSTEM message, and
    /// the partial transcript is retained.
    pub async fn run_session(
        &self,
        request: SessionRequest,
        cancel: CancellationToken,
    ) -> Result<SessionOutcome, CouncilError> {
        let roster = resolve_roster(
            &request.personas,
            request.mode,
            &request.topic,
            self.suggester.as_ref(),
            self.config.suggestion_confidence_threshold,
        )
        .await?;

        let max_rounds = self.config.max_rounds_for(request.mode);
        let settings = SessionSettings {
            topic: request.topic.clone(),
            rounds: max_rounds,
            councilors: roster
                .councilors
                .iter()
                .map(|c| c.persona.id.clone())
                .collect(),
        };
        let session_id = self
            .store
            .create_session(&request.topic, request.mode, settings, Some(&request.topic))
            .await
            .map_err(CouncilError::Persistence)?;

        info!(
            session = %session_id,
            mode = %request.mode,
            councilors = roster.councilors.len(),
            "council session starting"
        );

        let mut session =
            CouncilSession::new(&session_id, &request.topic, request.mode, max_rounds);
        let mut state = RunState::new();

        match self
            .drive(&mut session, &roster, &request, &cancel, &mut state)
            .await
        {
            Ok(()) => {
                let outcome = SessionOutcome {
                    session_id,
                    status: SessionStatus::Completed,
                    terminal_phase: session.phase,
                    rounds_completed: session.current_round,
                    result: state.result,
                    skipped_personas: state.skipped,
                    cancelled: state.cancelled,
                };
                info!(summary = %outcome.summary_line(), "council session finished");
                Ok(outcome)
            }
            Err(e) => Ok(self.fail_session(session, state, e).await),
        }
    }

    /// Mark the session failed, recording the cause. Best-effort: if the
    /// store itself is down these writes may fail too, but the transcript
    /// written so far is never discarded.
    async fn fail_session(
        &self,
        mut session: CouncilSession,
        state: RunState,
        error: DriveError,
    ) -> SessionOutcome {
        warn!(session = %session.id, error = %error, "council session failed");
        let _ = session.transition(CouncilPhase::Failed, &error.to_string());
        let _ = self
            .store
            .add_message(
                &session.id,
                NewMessage::system(&format!("session failed: {}", error)),
            )
            .await;
        let _ = self
            .store
            .update_status(&session.id, SessionStatus::Failed)
            .await;

        SessionOutcome {
            session_id: session.id.clone(),
            status: SessionStatus::Failed,
            terminal_phase: CouncilPhase::Failed,
            rounds_completed: session.current_round,
            result: state.result,
            skipped_personas: state.skipped,
            cancelled: state.cancelled,
        }
    }

    async fn drive(
        &self,
        session: &mut CouncilSession,
        roster: &Roster,
        request: &SessionRequest,
        cancel: &CancellationToken,
        state: &mut RunState,
    ) -> Result<(), DriveError> {
        session.transition(CouncilPhase::Opening, "roster resolved")?;
        self.opening_turn(session, roster, request, state).await?;

        if request.mode == SessionMode::Inquiry {
            session.transition(CouncilPhase::Complete, "inquiry answered")?;
            self.store
                .update_status(&session.id, SessionStatus::Completed)
                .await?;
            return Ok(());
        }

        while session.has_rounds_remaining() {
            // Cancellation is checked only at round boundaries so a turn
            // (and its tool sub-loop) is never half-written.
            if cancel.is_cancelled() {
                return self.cancel_session(session, state).await;
            }
            if request.mode == SessionMode::SwarmCoding && state.swarm_complete {
                break;
            }

            session.transition(CouncilPhase::Round, "round start")?;
            debug!(status = %session.status_line(), "round starting");

            for member in &roster.councilors {
                let text = self
                    .persona_turn(&member.persona, session, request, state)
                    .await?;
                if let Some(text) = text {
                    state.result = Some(text.clone());
                    if request.mode == SessionMode::SwarmCoding
                        && TurnEnvelope::parse(&text).signals_completion()
                    {
                        info!(session = %session.id, persona = %member.persona.id, "completion signalled");
                        state.swarm_complete = true;
                        break;
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            return self.cancel_session(session, state).await;
        }

        session.transition(CouncilPhase::Synthesis, "rounds finished")?;
        self.synthesis_turn(session, roster, request, state).await?;

        session.transition(CouncilPhase::Complete, "synthesis committed")?;
        self.store
            .update_status(&session.id, SessionStatus::Completed)
            .await?;
        Ok(())
    }

    /// Terminal path for a cancelled session: partial transcript retained,
    /// status committed as completed with a SYSTEM note.
    async fn cancel_session(
        &self,
        session: &mut CouncilSession,
        state: &mut RunState,
    ) -> Result<(), DriveError> {
        info!(session = %session.id, "session cancelled at round boundary");
        self.commit(
            &session.id,
            NewMessage::system("session cancelled; partial transcript retained"),
            state,
        )
        .await?;
        session.transition(CouncilPhase::Complete, "cancelled")?;
        self.store
            .update_status(&session.id, SessionStatus::Completed)
            .await?;
        state.cancelled = true;
        Ok(())
    }

    /// Opening statement (or the single inquiry answer): topic plus
    /// directive memories only, no prior transcript.
    async fn opening_turn(
        &self,
        session: &CouncilSession,
        roster: &Roster,
        request: &SessionRequest,
        state: &mut RunState,
    ) -> Result<(), DriveError> {
        let (persona, label, task) = match request.mode {
            SessionMode::Inquiry => {
                let addressed = request
                    .addressed_persona
                    .as_deref()
                    .and_then(|id| request.personas.iter().find(|p| p.enabled && p.id == id))
                    .unwrap_or(&roster.speaker);
                (addressed, "answer", prompts::inquiry_task(&request.topic))
            }
            _ => (&roster.speaker, "opening", prompts::opening_task(&request.topic)),
        };

        let context = self.assembler.assemble_opening(persona, request.mode, &task);
        match self.invoke_with_retry(persona, &context).await {
            Ok(text) => {
                self.commit(&session.id, NewMessage::bot(&persona.id, label, &text), state)
                    .await?;
                if request.mode == SessionMode::Inquiry {
                    state.result = Some(text);
                } else if request.mode == SessionMode::SwarmCoding
                    && TurnEnvelope::parse(&text).signals_completion()
                {
                    state.swarm_complete = true;
                }
            }
            Err(e) => self.skip_persona(&session.id, persona, &e, state).await?,
        }
        Ok(())
    }

    /// One councilor turn: context assembly, provider invocation with
    /// retry, and the bounded tool sub-loop. Returns the final plain text,
    /// or `None` when the persona was skipped.
    async fn persona_turn(
        &self,
        persona: &PersonaConfig,
        session: &CouncilSession,
        request: &SessionRequest,
        state: &mut RunState,
    ) -> Result<Option<String>, DriveError> {
        let definitions = self.registry.definitions_block();
        let mut task = prompts::contribution_task(&request.topic);
        let mut depth = 0u32;

        loop {
            let tools_available = !definitions.is_empty() && depth < self.config.max_tool_depth;
            let context = self.assembler.assemble(
                persona,
                request.mode,
                &request.topic,
                &state.transcript,
                tools_available.then_some(definitions.as_str()),
                &task,
            );

            let text = match self.invoke_with_retry(persona, &context).await {
                Ok(text) => text,
                Err(e) => {
                    self.skip_persona(&session.id, persona, &e, state).await?;
                    return Ok(None);
                }
            };

            match TurnEnvelope::parse(&text) {
                TurnEnvelope::ToolCall { name, arguments } if tools_available => {
                    debug!(persona = %persona.id, tool = %name, depth, "tool call requested");
                    self.commit(&session.id, NewMessage::bot(&persona.id, "tool_call", &text), state)
                        .await?;
                    let output = self.execute_tool(&name, arguments).await;
                    self.commit(&session.id, NewMessage::tool(&name, &output), state)
                        .await?;

                    depth += 1;
                    task = prompts::tool_followup_task(depth >= self.config.max_tool_depth)
                        .to_string();
                }
                _ => {
                    self.commit(
                        &session.id,
                        NewMessage::bot(&persona.id, "contribution", &text),
                        state,
                    )
                    .await?;
                    return Ok(Some(text));
                }
            }
        }
    }

    /// Moderator synthesis over the transcript; without a moderator (or
    /// when the moderator is skipped) the last contribution stands.
    async fn synthesis_turn(
        &self,
        session: &CouncilSession,
        roster: &Roster,
        request: &SessionRequest,
        state: &mut RunState,
    ) -> Result<(), DriveError> {
        let Some(moderator) = roster.moderator.as_ref() else {
            return Ok(());
        };

        let task = prompts::synthesis_task(&request.topic);
        let context = self.assembler.assemble(
            moderator,
            request.mode,
            &request.topic,
            &state.transcript,
            None,
            &task,
        );
        match self.invoke_with_retry(moderator, &context).await {
            Ok(text) => {
                self.commit(
                    &session.id,
                    NewMessage::bot(&moderator.id, "synthesis", &text),
                    state,
                )
                .await?;
                state.result = Some(text);
            }
            Err(e) => self.skip_persona(&session.id, moderator, &e, state).await?,
        }
        Ok(())
    }

    /// Provider call under the bounded backoff policy.
    async fn invoke_with_retry(
        &self,
        persona: &PersonaConfig,
        context: &TurnContext,
    ) -> Result<String, ProviderError> {
        let messages = context.to_messages();
        let mut attempt = 0u32;
        loop {
            match self.provider.get_response(persona, &messages).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.config.retry.max_retries => {
                    let delay = self.config.retry.delay_for(attempt);
                    warn!(
                        persona = %persona.id,
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "provider call failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Record a skipped persona; the round proceeds without it.
    async fn skip_persona(
        &self,
        session_id: &str,
        persona: &PersonaConfig,
        error: &ProviderError,
        state: &mut RunState,
    ) -> Result<(), DriveError> {
        warn!(persona = %persona.id, error = %error, "persona skipped for this round");
        state.skipped.push(persona.id.clone());
        self.commit(
            session_id,
            NewMessage::system(&format!(
                "persona {} skipped after exhausting retries: {}",
                persona.id, error
            )),
            state,
        )
        .await?;
        Ok(())
    }

    /// Execute a tool by name. Never fails from the round's perspective:
    /// unknown tools, execution errors, and timeouts all come back as the
    /// tool's textual output.
    async fn execute_tool(&self, name: &str, arguments: Value) -> String {
        let Some(tool) = self.registry.get(name) else {
            return format!("unknown tool: {}", name);
        };
        let timeout = Duration::from_secs(self.config.tool_timeout_secs);
        match tokio::time::timeout(timeout, tool.execute(arguments)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => format!("tool '{}' failed: {}", name, e),
            Err(_) => format!(
                "tool '{}' timed out after {}s",
                name, self.config.tool_timeout_secs
            ),
        }
    }

    /// Append a message durably and mirror it into the run transcript.
    async fn commit(
        &self,
        session_id: &str,
        message: NewMessage,
        state: &mut RunState,
    ) -> Result<(), DriveError> {
        let persisted = self.store.add_message(session_id, message).await?;
        state.transcript.push(persisted);
        Ok(())
    }
}
