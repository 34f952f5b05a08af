//! Per-thread workflow state: conversation, open decision requests and the
//! `running` / `suspended` / `done` phase marker.
//!
//! The phase invariant (never running with open requests, never suspended
//! without them) is kept by the mutators here, which is why the fields are
//! private. Deserialization re-checks it so a persisted state can be trusted
//! after a restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

use crate::conversation::{Conversation, Message, Role};
use crate::policy::DecisionKind;
use crate::tool::ToolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Running,
    Suspended,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Resolved,
}

/// A paused tool call waiting for a human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub id: String,
    pub tool_call: ToolCall,
    pub allowed_decisions: BTreeSet<DecisionKind>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

impl DecisionRequest {
    pub fn new(tool_call: ToolCall, allowed_decisions: BTreeSet<DecisionKind>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tool_call,
            allowed_decisions,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn allows(&self, kind: DecisionKind) -> bool {
        self.allowed_decisions.contains(&kind)
    }
}

/// A human's answer to a [`DecisionRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    /// Use `result` as the tool output without running the tool
    Respond {
        #[serde(default)]
        result: String,
    },
    /// Skip the tool and tell the model why
    Reject {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Run the tool with these arguments instead of the proposed ones
    Edit { arguments: Value },
}

impl Decision {
    pub fn respond(result: impl Into<String>) -> Self {
        Decision::Respond {
            result: result.into(),
        }
    }

    pub fn reject(reason: Option<&str>) -> Self {
        Decision::Reject {
            reason: reason.map(str::to_string),
        }
    }

    pub fn edit(arguments: Value) -> Self {
        Decision::Edit { arguments }
    }

    pub fn kind(&self) -> DecisionKind {
        match self {
            Decision::Respond { .. } => DecisionKind::Respond,
            Decision::Reject { .. } => DecisionKind::Reject,
            Decision::Edit { .. } => DecisionKind::Edit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("thread {thread_id} is still {phase:?}; a new turn needs a finished one")]
    TurnInProgress { thread_id: String, phase: Phase },
    #[error("corrupt workflow state: {0}")]
    CorruptState(String),
}

/// Everything one thread needs to pause and pick up again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WorkflowStateRecord")]
pub struct WorkflowState {
    id: String,
    turn: u32,
    phase: Phase,
    conversation: Conversation,
    /// Emission order of the reply that created them
    open_requests: Vec<DecisionRequest>,
    /// Call ids that already have a tool message (executed or resolved)
    settled_calls: BTreeSet<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Unchecked mirror used for deserialization.
#[derive(Deserialize)]
struct WorkflowStateRecord {
    id: String,
    turn: u32,
    phase: Phase,
    conversation: Conversation,
    #[serde(default)]
    open_requests: Vec<DecisionRequest>,
    #[serde(default)]
    settled_calls: BTreeSet<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WorkflowStateRecord> for WorkflowState {
    type Error = WorkflowError;

    fn try_from(r: WorkflowStateRecord) -> Result<Self, Self::Error> {
        let has_open = !r.open_requests.is_empty();
        match (r.phase, has_open) {
            (Phase::Suspended, false) => {
                return Err(WorkflowError::CorruptState(
                    "suspended without open requests".to_string(),
                ))
            }
            (Phase::Running | Phase::Done, true) => {
                return Err(WorkflowError::CorruptState(format!(
                    "{:?} with {} open request(s)",
                    r.phase,
                    r.open_requests.len()
                )))
            }
            _ => {}
        }
        let mut seen = HashSet::new();
        for request in &r.open_requests {
            if request.status != RequestStatus::Pending {
                return Err(WorkflowError::CorruptState(format!(
                    "open request {} is not pending",
                    request.id
                )));
            }
            if !seen.insert(request.tool_call.id.as_str()) {
                return Err(WorkflowError::CorruptState(format!(
                    "tool call {} has more than one open request",
                    request.tool_call.id
                )));
            }
        }
        Ok(Self {
            id: r.id,
            turn: r.turn,
            phase: r.phase,
            conversation: r.conversation,
            open_requests: r.open_requests,
            settled_calls: r.settled_calls,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

impl WorkflowState {
    /// Start the first turn of a thread.
    pub fn new(
        id: impl Into<String>,
        mut conversation: Conversation,
        user_message: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        conversation.push(Message::user(user_message));
        Self {
            id: id.into(),
            turn: 1,
            phase: Phase::Running,
            conversation,
            open_requests: Vec::new(),
            settled_calls: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Start a fresh thread with a generated id.
    pub fn start(conversation: Conversation, user_message: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), conversation, user_message)
    }

    /// A thread with no turns yet. It is `done` (nothing to advance) until
    /// [`WorkflowState::next_turn`] brings the first user message.
    pub fn idle(id: impl Into<String>, conversation: Conversation) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            turn: 0,
            phase: Phase::Done,
            conversation,
            open_requests: Vec::new(),
            settled_calls: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Begin the next turn of a finished thread, keeping its history.
    pub fn next_turn(&mut self, user_message: impl Into<String>) -> Result<(), WorkflowError> {
        if self.phase != Phase::Done {
            return Err(WorkflowError::TurnInProgress {
                thread_id: self.id.clone(),
                phase: self.phase,
            });
        }
        self.conversation.push(Message::user(user_message));
        self.turn += 1;
        self.phase = Phase::Running;
        self.touch();
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn open_requests(&self) -> &[DecisionRequest] {
        &self.open_requests
    }

    pub fn open_request(&self, request_id: &str) -> Option<&DecisionRequest> {
        self.open_requests.iter().find(|r| r.id == request_id)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// The call id already has a result or is waiting on a human.
    pub fn knows_call(&self, call_id: &str) -> bool {
        self.settled_calls.contains(call_id)
            || self.open_requests.iter().any(|r| r.tool_call.id == call_id)
    }

    /// The turn's output: the final assistant message, once `done`.
    pub fn final_reply(&self) -> Option<&Message> {
        if self.phase != Phase::Done {
            return None;
        }
        self.conversation
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
    }

    /// Record a reply without tool calls and finish the turn.
    pub(crate) fn complete_turn(&mut self, reply: Message) {
        debug_assert!(self.open_requests.is_empty());
        self.conversation.push(reply);
        self.phase = Phase::Done;
        self.touch();
    }

    /// Append one round in a single step: the model reply, the tool messages
    /// produced for it (emission order) and the requests it opened.
    pub(crate) fn commit_round(
        &mut self,
        reply: Message,
        tool_messages: Vec<Message>,
        requests: Vec<DecisionRequest>,
    ) {
        self.conversation.push(reply);
        for message in tool_messages {
            if let Some(call_id) = &message.tool_call_id {
                self.settled_calls.insert(call_id.clone());
            }
            self.conversation.push(message);
        }
        self.open_requests.extend(requests);
        self.phase = if self.open_requests.is_empty() {
            Phase::Running
        } else {
            Phase::Suspended
        };
        self.touch();
    }

    /// Close an open request with the tool message that answers it.
    /// Returns the resolved request, or `None` if it was not open.
    pub(crate) fn resolve_request(
        &mut self,
        request_id: &str,
        message: Message,
    ) -> Option<DecisionRequest> {
        let index = self.open_requests.iter().position(|r| r.id == request_id)?;
        let mut request = self.open_requests.remove(index);
        request.status = RequestStatus::Resolved;
        self.settled_calls.insert(request.tool_call.id.clone());
        self.conversation.push(message);
        if self.open_requests.is_empty() {
            self.phase = Phase::Running;
        }
        self.touch();
        Some(request)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
