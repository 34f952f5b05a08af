use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::policy::DecisionKind;
use crate::workflow::Phase;

/// Events emitted while a thread advances.
/// The outer layer decides how to relay them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// The model answered; `tool_calls` is how many calls the reply proposes
    ModelReplied {
        round: usize,
        tool_calls: usize,
    },
    /// An allowed (or edited) call ran through the registry
    ToolExecuted {
        call_id: String,
        tool: String,
        is_error: bool,
    },
    /// A call was paused for a human
    DecisionRequested {
        request_id: String,
        call_id: String,
        tool: String,
        allowed_decisions: BTreeSet<DecisionKind>,
    },
    /// A human decision closed a request
    DecisionResolved {
        request_id: String,
        call_id: String,
        decision: DecisionKind,
    },
    /// The model replied without tool calls
    TurnCompleted {
        content: String,
    },
}

/// What one call into the loop produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    pub phase: Phase,
    /// Model invocations made by this call
    pub rounds: usize,
    pub events: Vec<WorkflowEvent>,
}

impl TurnReport {
    pub(crate) fn idle(phase: Phase) -> Self {
        Self {
            phase,
            rounds: 0,
            events: Vec::new(),
        }
    }

    /// Open requests created during this call.
    pub fn decision_requests(&self) -> impl Iterator<Item = &WorkflowEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, WorkflowEvent::DecisionRequested { .. }))
    }
}
