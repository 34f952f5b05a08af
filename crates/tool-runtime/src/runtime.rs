use crate::conversation::{Message, Role};
use crate::events::{TurnReport, WorkflowEvent};
use crate::gate::{GateVerdict, InterruptGate};
use crate::model::{ModelClient, ModelError, ModelRequest};
use crate::policy::InterceptPolicy;
use crate::registry::ToolRegistry;
use crate::resume::{ResumeError, ResumeHandler, ResumeOutcome};
use crate::tool::{ToolCall, ToolContext};
use crate::workflow::{Decision, DecisionRequest, Phase, WorkflowState};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How one proposed call is handled within a round.
enum Planned {
    Execute(ToolCall),
    Intercept(DecisionRequest),
    Duplicate(ToolCall),
}

/// The orchestration loop that drives model ↔ tool execution and stops at
/// policy-gated calls.
///
/// Flow: User → Model → ToolCalls → Gate → Execute | Suspend → ... → Final Text
///
/// Shared state (model client, registry, policy) is read-only; each thread's
/// [`WorkflowState`] is passed in by `&mut`, so one thread advances strictly
/// sequentially while different threads may run in parallel.
pub struct Orchestrator {
    model: Arc<dyn ModelClient>,
    registry: Arc<ToolRegistry>,
    gate: InterruptGate,
    resume_handler: ResumeHandler,
    max_rounds: usize,
    tool_concurrency: usize,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ModelClient>,
        registry: Arc<ToolRegistry>,
        policy: Arc<InterceptPolicy>,
    ) -> Self {
        Self {
            model,
            resume_handler: ResumeHandler::new(registry.clone()),
            registry,
            gate: InterruptGate::new(policy),
            max_rounds: 25,
            tool_concurrency: 4,
        }
    }

    /// Model calls allowed per turn; at least one.
    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max.max(1);
        self
    }

    /// Upper bound on allowed calls of one reply running at the same time.
    pub fn with_tool_concurrency(mut self, limit: usize) -> Self {
        self.tool_concurrency = limit.max(1);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn gate(&self) -> &InterruptGate {
        &self.gate
    }

    /// Drive a `running` thread until it finishes the turn or suspends.
    ///
    /// Suspended and done threads are returned untouched without calling the
    /// model. Each round is committed to `state` only after its model reply
    /// and all allowed tool calls have completed, so dropping this future
    /// leaves `state` at the last complete round. A model failure is returned
    /// as-is with the thread still `running`, ready for a retry.
    pub async fn advance(&self, state: &mut WorkflowState) -> Result<TurnReport, OrchestratorError> {
        if state.phase() != Phase::Running {
            debug!(thread_id = %state.id(), phase = ?state.phase(), "nothing to advance");
            return Ok(TurnReport::idle(state.phase()));
        }

        let mut events = Vec::new();
        for round in 0..self.max_rounds {
            debug!(thread_id = %state.id(), round, "starting round");

            let request = ModelRequest {
                system_prompt: state.conversation().system_prompt().map(String::from),
                messages: state.conversation().messages().to_vec(),
                tools: self.registry.describe(),
            };
            let reply = self.model.complete(request).await?;
            if reply.role != Role::Assistant {
                return Err(ModelError::MalformedReply(format!(
                    "expected an assistant reply, got {:?}",
                    reply.role
                ))
                .into());
            }
            events.push(WorkflowEvent::ModelReplied {
                round,
                tool_calls: reply.tool_calls.len(),
            });

            if !reply.has_tool_calls() {
                info!(thread_id = %state.id(), round, "turn complete (no tool calls)");
                events.push(WorkflowEvent::TurnCompleted {
                    content: reply.content.clone(),
                });
                state.complete_turn(reply);
                return Ok(TurnReport {
                    phase: Phase::Done,
                    rounds: round + 1,
                    events,
                });
            }

            let (tool_messages, requests) =
                self.process_tool_calls(state, &reply.tool_calls, &mut events).await;
            state.commit_round(reply, tool_messages, requests);

            if state.phase() == Phase::Suspended {
                info!(
                    thread_id = %state.id(),
                    round,
                    open_requests = state.open_requests().len(),
                    "suspended for human decision"
                );
                return Ok(TurnReport {
                    phase: Phase::Suspended,
                    rounds: round + 1,
                    events,
                });
            }
        }

        warn!(thread_id = %state.id(), max_rounds = self.max_rounds, "round limit reached");
        Err(OrchestratorError::MaxRounds(self.max_rounds))
    }

    /// Apply a human decision. See [`ResumeHandler::resume`]. When this
    /// resolves the last open request the thread is `running` again and the
    /// caller continues it with [`Orchestrator::advance`].
    pub async fn resume(
        &self,
        state: &mut WorkflowState,
        request_id: &str,
        decision: Decision,
    ) -> Result<ResumeOutcome, ResumeError> {
        self.resume_handler.resume(state, request_id, decision).await
    }

    /// Gate every call in emission order, run the allowed ones (concurrently,
    /// bounded) and return their tool messages in emission order together with
    /// the requests opened for intercepted calls. Nothing is written to `state`.
    async fn process_tool_calls(
        &self,
        state: &WorkflowState,
        tool_calls: &[ToolCall],
        events: &mut Vec<WorkflowEvent>,
    ) -> (Vec<Message>, Vec<DecisionRequest>) {
        let mut seen = HashSet::new();
        let plan: Vec<Planned> = tool_calls
            .iter()
            .map(|call| {
                if state.knows_call(&call.id) || !seen.insert(call.id.as_str()) {
                    return Planned::Duplicate(call.clone());
                }
                match self.gate.evaluate(call) {
                    GateVerdict::Allow => Planned::Execute(call.clone()),
                    GateVerdict::Intercept(allowed) => {
                        Planned::Intercept(DecisionRequest::new(call.clone(), allowed))
                    }
                }
            })
            .collect();

        let to_execute: Vec<ToolCall> = plan
            .iter()
            .filter_map(|p| match p {
                Planned::Execute(call) => Some(call.clone()),
                _ => None,
            })
            .collect();
        info!(
            thread_id = %state.id(),
            proposed = tool_calls.len(),
            executing = to_execute.len(),
            "processing tool calls"
        );

        // `buffered` yields in input order regardless of completion order.
        let thread_id = state.id().to_string();
        let executed: Vec<Message> = stream::iter(to_execute)
            .map(|call| {
                let context = ToolContext {
                    thread_id: thread_id.clone(),
                    call_id: call.id.clone(),
                };
                async move { self.execute_call(call, context).await }
            })
            .buffered(self.tool_concurrency)
            .collect()
            .await;
        let mut executed = executed.into_iter();

        let mut tool_messages = Vec::new();
        let mut requests = Vec::new();
        for planned in plan {
            match planned {
                Planned::Execute(call) => {
                    let Some(message) = executed.next() else {
                        continue;
                    };
                    events.push(WorkflowEvent::ToolExecuted {
                        call_id: call.id,
                        tool: call.name,
                        is_error: message.is_error,
                    });
                    tool_messages.push(message);
                }
                Planned::Duplicate(call) => {
                    warn!(call_id = %call.id, tool = %call.name, "duplicate tool call id, not executed");
                    tool_messages.push(Message::tool_error(
                        &call.id,
                        format!(
                            "Error: tool call id '{}' was already used in this conversation; the call was not executed",
                            call.id
                        ),
                    ));
                }
                Planned::Intercept(request) => {
                    events.push(WorkflowEvent::DecisionRequested {
                        request_id: request.id.clone(),
                        call_id: request.tool_call.id.clone(),
                        tool: request.tool_call.name.clone(),
                        allowed_decisions: request.allowed_decisions.clone(),
                    });
                    requests.push(request);
                }
            }
        }

        (tool_messages, requests)
    }

    /// Run one allowed call; failures become an error tool message.
    async fn execute_call(&self, call: ToolCall, context: ToolContext) -> Message {
        match self
            .registry
            .invoke(&call.name, call.arguments, &context)
            .await
        {
            Ok(content) => Message::tool_result(&call.id, content),
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "tool call failed");
                Message::tool_error(&call.id, format!("Error: {e}"))
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Max rounds ({0}) exceeded")]
    MaxRounds(usize),
}
