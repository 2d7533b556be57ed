//! Dispatcher: generation → extraction → validation → one tool execution.
//!
//! Single-shot mode makes one generation pass and answers with
//! `"<label>: <value>"`. Iterative mode runs a bounded
//! Thought/Action/Observation loop and normalizes the final transcript.
//! Either way at most one tool runs per turn.
//!
//! The turn runs until a [`Deadline`] shared with the caller, so time spent
//! before dispatch (tool discovery) counts against the same budget. When it
//! fires the turn returns a timeout reply and drops its futures, which
//! releases the generator slot. A generator backend that keeps working after its future
//! is dropped is not stopped; abandonment is best effort.

use super::normalizer::{extract_final_answer, NormalizerOptions};
use super::system_prompt::{build_followup, build_system_prompt};
use super::{extractor, validator};
use crate::config::{DispatchMode, MediatorConfig};
use crate::error::{describe_error, MediatorError};
use crate::inference::GeneratorSession;
use crate::tools::ToolRegistry;
use crate::types::{
    ConversationTurn, ToolResult, ToolSchema, ToolValue, TurnOutcome, ValidatedInvocation,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Wall-clock limit for one request, fixed when the request arrives.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    pub at: Instant,
    pub budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    /// Mark `turn` as having run out of time.
    pub fn expire(&self, turn: &mut ConversationTurn) {
        warn!(
            "Turn {} exceeded {:?}, abandoning in-flight work",
            turn.id, self.budget
        );
        turn.final_reply = MediatorError::GenerationTimeout(self.budget.as_secs()).to_string();
        turn.outcome = TurnOutcome::Timeout;
    }
}

pub struct Dispatcher {
    session: GeneratorSession,
    registry: Arc<dyn ToolRegistry>,
    mode: DispatchMode,
    normalizer: NormalizerOptions,
}

impl Dispatcher {
    pub fn new(
        session: GeneratorSession,
        registry: Arc<dyn ToolRegistry>,
        mode: DispatchMode,
        normalizer: NormalizerOptions,
    ) -> Self {
        Self {
            session,
            registry,
            mode,
            normalizer,
        }
    }

    pub fn from_config(
        session: GeneratorSession,
        registry: Arc<dyn ToolRegistry>,
        config: &MediatorConfig,
    ) -> Self {
        Self::new(
            session,
            registry,
            config.mode,
            NormalizerOptions {
                max_chars: config.answer_max_chars,
                numeric_preference: config.numeric_preference,
            },
        )
    }

    /// Run one turn. Always produces a reply; failures become reply text.
    pub async fn run(
        &self,
        user_message: &str,
        tools: &[ToolSchema],
        max_iterations: u32,
        deadline: Deadline,
    ) -> ConversationTurn {
        let mut turn = ConversationTurn::new(user_message);

        let drive = async {
            match self.mode {
                DispatchMode::SingleShot => self.single_shot(&mut turn, tools).await,
                DispatchMode::Iterative => self.iterative(&mut turn, tools, max_iterations).await,
            }
        };

        if tokio::time::timeout_at(deadline.at, drive).await.is_err() {
            deadline.expire(&mut turn);
        }

        debug!(
            "Turn {} finished: {} ({} chars)",
            turn.id,
            turn.outcome,
            turn.final_reply.len()
        );
        turn
    }

    async fn single_shot(&self, turn: &mut ConversationTurn, tools: &[ToolSchema]) {
        let system_prompt = build_system_prompt(tools, DispatchMode::SingleShot);
        let user_message = turn.user_message.clone();
        let Some(text) = self.generate(turn, &system_prompt, &user_message).await else {
            return;
        };
        turn.generated_text = Some(text.clone());

        let Some(candidate) = extractor::extract(&text) else {
            turn.final_reply = text.trim().to_string();
            turn.outcome = TurnOutcome::DirectReply;
            return;
        };

        let invocation = match validator::validate(&candidate, tools) {
            Ok(invocation) => invocation,
            Err(e) => {
                warn!("Rejected call to '{}': {}", candidate.tool_name, e);
                turn.final_reply = MediatorError::from(e).to_string();
                turn.outcome = TurnOutcome::InvalidCall;
                return;
            }
        };

        // Anything after the first call in `text` is ignored.
        let label = invocation.call.label().to_string();
        match self.execute(turn, invocation).await {
            Ok(value) => {
                turn.final_reply = format!("{}: {}", label, value);
                turn.outcome = TurnOutcome::ToolAnswered;
            }
            Err(err) => {
                turn.final_reply = err.to_string();
                turn.outcome = TurnOutcome::ToolFailed;
            }
        }
    }

    async fn iterative(&self, turn: &mut ConversationTurn, tools: &[ToolSchema], max_iterations: u32) {
        let system_prompt = build_system_prompt(tools, DispatchMode::Iterative);
        let mut observations: Vec<String> = Vec::new();
        let mut transcript = String::new();
        let mut answered: Option<(String, ToolValue)> = None;

        for iteration in 1..=max_iterations {
            debug!("Iteration {}/{} for turn {}", iteration, max_iterations, turn.id);

            let input = build_followup(&turn.user_message, &observations);
            let Some(text) = self.generate(turn, &system_prompt, &input).await else {
                return;
            };
            if !transcript.is_empty() {
                transcript.push('\n');
            }
            transcript.push_str(&text);
            turn.generated_text = Some(transcript.clone());

            let Some(candidate) = extractor::extract(&text) else {
                turn.final_reply = extract_final_answer(&text, self.normalizer);
                turn.outcome = if answered.is_some() {
                    TurnOutcome::ToolAnswered
                } else {
                    TurnOutcome::DirectReply
                };
                return;
            };

            if let Some((label, value)) = &answered {
                info!(
                    "Ignoring further call to '{}', one tool per turn",
                    candidate.tool_name
                );
                turn.final_reply = format!("{}: {}", label, value);
                turn.outcome = TurnOutcome::ToolAnswered;
                return;
            }

            let invocation = match validator::validate(&candidate, tools) {
                Ok(invocation) => invocation,
                Err(e) => {
                    debug!("Invalid call to '{}' fed back: {}", candidate.tool_name, e);
                    let err = MediatorError::from(e);
                    observations.push(format!("{}\nObservation: {}", text.trim(), err));
                    continue;
                }
            };

            let label = invocation.call.label().to_string();
            match self.execute(turn, invocation).await {
                Ok(value) => {
                    observations.push(format!("{}\nObservation: {}", text.trim(), value));
                    answered = Some((label, value));
                }
                Err(err) => {
                    turn.final_reply = err.to_string();
                    turn.outcome = TurnOutcome::ToolFailed;
                    return;
                }
            }
        }

        if let Some((label, value)) = answered {
            turn.final_reply = format!("{}: {}", label, value);
            turn.outcome = TurnOutcome::ToolAnswered;
            return;
        }

        warn!(
            "Turn {} reached {} iterations without a final answer",
            turn.id, max_iterations
        );
        turn.final_reply = MediatorError::MaxIterationsReached(max_iterations).to_string();
        turn.outcome = TurnOutcome::MaxIterationsReached;
    }

    /// Generate once; on failure record the reply on the turn and return `None`.
    async fn generate(
        &self,
        turn: &mut ConversationTurn,
        system_prompt: &str,
        user_message: &str,
    ) -> Option<String> {
        match self.session.generate(system_prompt, user_message).await {
            Ok(text) => Some(text),
            Err(e) => {
                let reason = describe_error(&e);
                warn!("Generation failed: {}", reason);
                turn.final_reply = format!("Generation failed: {}", reason);
                turn.outcome = TurnOutcome::GenerationFailed;
                None
            }
        }
    }

    /// Execute exactly once and record the result on the turn. Never retried.
    async fn execute(
        &self,
        turn: &mut ConversationTurn,
        invocation: ValidatedInvocation,
    ) -> Result<ToolValue, MediatorError> {
        let name = invocation.call.name().to_string();
        let arguments = invocation.call.arguments();
        info!("Executing {} with {:?}", name, arguments);

        let outcome = self.registry.invoke(&name, &arguments).await;
        turn.invocation = Some(invocation);

        match outcome {
            Ok(value) => {
                info!("{} returned {}", name, value);
                turn.result = Some(ToolResult::Success {
                    tool_name: name,
                    value: value.clone(),
                });
                Ok(value)
            }
            Err(e) => {
                warn!("{} failed: {}", name, e);
                turn.result = Some(ToolResult::Failure {
                    tool_name: name.clone(),
                    reason: e.to_string(),
                });
                Err(e.into_mediator_error(&name))
            }
        }
    }
}
