//! Interrupt policy: which tools pause for a human decision, and which
//! decisions the human may take for each of them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::tools::browser::{EXECUTE_JAVASCRIPT, GET_BROWSER_STATE};

/// What a human may do with an intercepted tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Treat the call as executed and inject a human-supplied result
    Respond,
    /// Do not execute; inject a rejection message
    Reject,
    /// Execute with human-amended arguments
    Edit,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Respond => "respond",
            DecisionKind::Reject => "reject",
            DecisionKind::Edit => "edit",
        }
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps tool names to the decisions allowed when that tool is intercepted.
///
/// A tool absent from the table is never intercepted. Every entry holds a
/// non-empty set; this is checked on construction and on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, BTreeSet<DecisionKind>>",
    into = "BTreeMap<String, BTreeSet<DecisionKind>>"
)]
pub struct InterceptPolicy {
    rules: BTreeMap<String, BTreeSet<DecisionKind>>,
}

impl InterceptPolicy {
    /// An empty policy: nothing is intercepted.
    pub fn new() -> Self {
        Self::default()
    }

    /// The browser agent's shipped configuration.
    pub fn reference() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(
            EXECUTE_JAVASCRIPT.to_string(),
            BTreeSet::from([DecisionKind::Respond]),
        );
        rules.insert(
            GET_BROWSER_STATE.to_string(),
            BTreeSet::from([DecisionKind::Respond, DecisionKind::Reject]),
        );
        Self { rules }
    }

    /// Builder form of [`InterceptPolicy::insert`].
    pub fn with_rule(
        mut self,
        tool_name: impl Into<String>,
        allowed: impl IntoIterator<Item = DecisionKind>,
    ) -> Result<Self, PolicyError> {
        self.insert(tool_name, allowed)?;
        Ok(self)
    }

    /// Gate `tool_name`, replacing any previous rule for it.
    pub fn insert(
        &mut self,
        tool_name: impl Into<String>,
        allowed: impl IntoIterator<Item = DecisionKind>,
    ) -> Result<(), PolicyError> {
        let tool_name = tool_name.into();
        let allowed: BTreeSet<DecisionKind> = allowed.into_iter().collect();
        if allowed.is_empty() {
            return Err(PolicyError::EmptyDecisionSet(tool_name));
        }
        self.rules.insert(tool_name, allowed);
        Ok(())
    }

    /// Allowed decisions for a gated tool; `None` means the tool runs freely.
    /// Exact match only.
    pub fn allowed_decisions(&self, tool_name: &str) -> Option<&BTreeSet<DecisionKind>> {
        self.rules.get(tool_name)
    }

    pub fn is_gated(&self, tool_name: &str) -> bool {
        self.rules.contains_key(tool_name)
    }

    /// Names of all gated tools, sorted.
    pub fn gated_tools(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl TryFrom<BTreeMap<String, BTreeSet<DecisionKind>>> for InterceptPolicy {
    type Error = PolicyError;

    fn try_from(rules: BTreeMap<String, BTreeSet<DecisionKind>>) -> Result<Self, Self::Error> {
        if let Some((name, _)) = rules.iter().find(|(_, allowed)| allowed.is_empty()) {
            return Err(PolicyError::EmptyDecisionSet(name.clone()));
        }
        Ok(Self { rules })
    }
}

impl From<InterceptPolicy> for BTreeMap<String, BTreeSet<DecisionKind>> {
    fn from(policy: InterceptPolicy) -> Self {
        policy.rules
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("tool '{0}' is gated with an empty set of allowed decisions")]
    EmptyDecisionSet(String),
}
