//! Resume handler: turns one human decision into the tool message that
//! answers a paused call.

use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::conversation::Message;
use crate::events::WorkflowEvent;
use crate::policy::DecisionKind;
use crate::registry::{RegistryError, ToolRegistry};
use crate::tool::{ToolCall, ToolContext};
use crate::workflow::{Decision, DecisionRequest, Phase, WorkflowState};

/// Result of a successful [`ResumeHandler::resume`].
#[derive(Debug, Clone)]
pub struct ResumeOutcome {
    /// The request, now marked resolved and no longer open
    pub request: DecisionRequest,
    /// The tool message appended for it
    pub message: Message,
    /// `Running` once the last open request is resolved
    pub phase: Phase,
    pub events: Vec<WorkflowEvent>,
}

#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    #[error("no open decision request with id '{0}'")]
    UnknownRequest(String),
    #[error("decision '{kind}' is not allowed for request '{request_id}' (allowed: {allowed:?})")]
    InvalidDecisionKind {
        request_id: String,
        kind: DecisionKind,
        allowed: Vec<DecisionKind>,
    },
    #[error("edited arguments rejected for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },
}

pub struct ResumeHandler {
    registry: Arc<ToolRegistry>,
}

impl ResumeHandler {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Apply `decision` to the open request `request_id`.
    ///
    /// On any error the state is left exactly as it was and the request
    /// stays open.
    pub async fn resume(
        &self,
        state: &mut WorkflowState,
        request_id: &str,
        decision: Decision,
    ) -> Result<ResumeOutcome, ResumeError> {
        let request = state
            .open_request(request_id)
            .ok_or_else(|| ResumeError::UnknownRequest(request_id.to_string()))?;

        let kind = decision.kind();
        if !request.allows(kind) {
            warn!(
                thread_id = %state.id(),
                request_id,
                %kind,
                "decision kind not allowed for request"
            );
            return Err(ResumeError::InvalidDecisionKind {
                request_id: request_id.to_string(),
                kind,
                allowed: request.allowed_decisions.iter().copied().collect(),
            });
        }

        let call = request.tool_call.clone();
        let mut events = Vec::new();
        let message = match decision {
            Decision::Respond { result } => Message::tool_result(&call.id, result),
            Decision::Reject { reason } => {
                Message::tool_result(&call.id, rejection_content(&call, reason.as_deref()))
            }
            Decision::Edit { arguments } => {
                let message = self.execute_edited(state.id(), &call, arguments).await?;
                events.push(WorkflowEvent::ToolExecuted {
                    call_id: call.id.clone(),
                    tool: call.name.clone(),
                    is_error: message.is_error,
                });
                message
            }
        };

        let request = state
            .resolve_request(request_id, message.clone())
            .ok_or_else(|| ResumeError::UnknownRequest(request_id.to_string()))?;
        events.push(WorkflowEvent::DecisionResolved {
            request_id: request.id.clone(),
            call_id: call.id.clone(),
            decision: kind,
        });

        info!(
            thread_id = %state.id(),
            request_id,
            tool = %call.name,
            %kind,
            remaining = state.open_requests().len(),
            "decision applied"
        );

        Ok(ResumeOutcome {
            request,
            message,
            phase: state.phase(),
            events,
        })
    }

    /// Run the tool with amended arguments under the original call id.
    /// Only a schema violation is returned to the submitter, before anything
    /// runs. Once the tool has been invoked every failure becomes an error
    /// tool message like a normal failed call.
    async fn execute_edited(
        &self,
        thread_id: &str,
        call: &ToolCall,
        arguments: serde_json::Value,
    ) -> Result<Message, ResumeError> {
        if let Err(RegistryError::InvalidArguments { tool, reason }) =
            self.registry.validate(&call.name, &arguments)
        {
            return Err(ResumeError::InvalidArguments { tool, reason });
        }

        let context = ToolContext {
            thread_id: thread_id.to_string(),
            call_id: call.id.clone(),
        };
        match self.registry.invoke(&call.name, arguments, &context).await {
            Ok(content) => Ok(Message::tool_result(&call.id, content)),
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "edited tool call failed");
                Ok(Message::tool_error(&call.id, format!("Error: {e}")))
            }
        }
    }
}

/// Structured rejection text the model receives in place of a result.
fn rejection_content(call: &ToolCall, reason: Option<&str>) -> String {
    let mut body = json!({
        "status": "rejected",
        "tool": call.name,
        "tool_call_id": call.id,
        "message": format!("The user rejected the call to '{}'; it was not executed.", call.name),
    });
    if let Some(reason) = reason {
        body["reason"] = json!(reason);
    }
    body.to_string()
}
