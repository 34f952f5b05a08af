use std::collections::BTreeSet;
use std::sync::Arc;

use crate::policy::{DecisionKind, InterceptPolicy};
use crate::tool::ToolCall;

/// Outcome of checking one proposed tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    /// Execute immediately
    Allow,
    /// Pause and ask a human; carries the decisions they may take
    Intercept(BTreeSet<DecisionKind>),
}

/// Classifies tool calls against the interrupt policy.
///
/// Depends only on the policy and the call's tool name, never on history or
/// model state. The policy sits behind `Arc` and is never mutated, so the same
/// name always gets the same verdict.
#[derive(Debug, Clone)]
pub struct InterruptGate {
    policy: Arc<InterceptPolicy>,
}

impl InterruptGate {
    pub fn new(policy: Arc<InterceptPolicy>) -> Self {
        Self { policy }
    }

    pub fn evaluate(&self, call: &ToolCall) -> GateVerdict {
        match self.policy.allowed_decisions(&call.name) {
            Some(allowed) => GateVerdict::Intercept(allowed.clone()),
            None => GateVerdict::Allow,
        }
    }

    pub fn policy(&self) -> &InterceptPolicy {
        &self.policy
    }
}
