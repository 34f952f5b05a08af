#![allow(dead_code)]

use async_trait::async_trait;
use pilot_tool_runtime::model::mock::MockModelClient;
use pilot_tool_runtime::{
    Conversation, InterceptPolicy, Message, ModelClient, ModelError, ModelRequest, Orchestrator,
    Role, Tool, ToolCall, ToolContext, ToolDefinition, ToolError, ToolRegistry, WorkflowState,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// "tool:call_id" for every call that reached a tool's `execute`.
pub type InvocationLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> InvocationLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &InvocationLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Wraps a tool and records each invocation before delegating.
pub struct Recorded<T> {
    inner: T,
    log: InvocationLog,
}

impl<T> Recorded<T> {
    pub fn new(inner: T, log: InvocationLog) -> Self {
        Self { inner, log }
    }
}

#[async_trait]
impl<T: Tool> Tool for Recorded<T> {
    fn definition(&self) -> ToolDefinition {
        self.inner.definition()
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<String, ToolError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.inner.definition().name, context.call_id));
        self.inner.execute(arguments, context).await
    }
}

/// Ungated tool used alongside the browser tools.
pub struct SomeOtherTool;

#[async_trait]
impl Tool for SomeOtherTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "some_other_tool".to_string(),
            description: "Does something harmless".to_string(),
            input_schema: json!({"type": "object"}),
        }
    }

    async fn execute(&self, _arguments: Value, context: &ToolContext) -> Result<String, ToolError> {
        Ok(format!("other done ({})", context.call_id))
    }
}

/// Echoes `message` after sleeping `delay_ms`; records completion order.
pub struct DelayedEcho {
    pub completed: InvocationLog,
}

#[async_trait]
impl Tool for DelayedEcho {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "delayed_echo".to_string(),
            description: "Echo after a delay".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string"},
                    "delay_ms": {"type": "integer", "minimum": 0}
                },
                "required": ["message", "delay_ms"]
            }),
        }
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<String, ToolError> {
        let delay = arguments["delay_ms"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.completed.lock().unwrap().push(context.call_id.clone());
        Ok(arguments["message"].as_str().unwrap_or_default().to_string())
    }
}

/// Always fails at execution time.
pub struct FlakyTool;

#[async_trait]
impl Tool for FlakyTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "flaky".to_string(),
            description: "Fails".to_string(),
            input_schema: json!({"type": "object"}),
        }
    }

    async fn execute(&self, _arguments: Value, _context: &ToolContext) -> Result<String, ToolError> {
        Err(ToolError::ExecutionFailed("page crashed".to_string()))
    }
}

/// Accepts any object but refuses to run without a `selector`.
pub struct PickyTool;

#[async_trait]
impl Tool for PickyTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "picky".to_string(),
            description: "Clicks an element".to_string(),
            input_schema: json!({"type": "object"}),
        }
    }

    async fn execute(&self, arguments: Value, _context: &ToolContext) -> Result<String, ToolError> {
        match arguments.get("selector").and_then(Value::as_str) {
            Some(selector) => Ok(format!("clicked {selector}")),
            None => Err(ToolError::InvalidInput("selector not found".to_string())),
        }
    }
}

/// Answers "re: <last user message>" so parallel threads can share it.
pub struct ParrotModel;

#[async_trait]
impl ModelClient for ParrotModel {
    async fn complete(&self, request: ModelRequest) -> Result<Message, ModelError> {
        tokio::task::yield_now().await;
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(Message::assistant(format!("re: {last_user}"), vec![]))
    }

    fn model_name(&self) -> &str {
        "parrot"
    }
}

/// Registry with the browser tools plus the test tools, all recorded.
pub fn recorded_registry(log: &InvocationLog, completed: &InvocationLog) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register(Recorded::new(
            pilot_tool_runtime::ExecuteJavascriptTool,
            log.clone(),
        ))
        .unwrap();
    registry
        .register(Recorded::new(
            pilot_tool_runtime::GetBrowserStateTool,
            log.clone(),
        ))
        .unwrap();
    registry
        .register(Recorded::new(SomeOtherTool, log.clone()))
        .unwrap();
    registry
        .register(Recorded::new(
            DelayedEcho {
                completed: completed.clone(),
            },
            log.clone(),
        ))
        .unwrap();
    registry.register(Recorded::new(FlakyTool, log.clone())).unwrap();
    registry.register(Recorded::new(PickyTool, log.clone())).unwrap();
    registry
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub model: Arc<MockModelClient>,
    pub log: InvocationLog,
    pub completed: InvocationLog,
}

pub fn harness_with(model: MockModelClient, policy: InterceptPolicy) -> Harness {
    pilot_core::telemetry::init_test_tracing();
    let log = new_log();
    let completed = new_log();
    let model = Arc::new(model);
    let orchestrator = Orchestrator::new(
        model.clone() as Arc<dyn ModelClient>,
        Arc::new(recorded_registry(&log, &completed)),
        Arc::new(policy),
    );
    Harness {
        orchestrator,
        model,
        log,
        completed,
    }
}

pub fn harness() -> Harness {
    harness_with(MockModelClient::new(), InterceptPolicy::reference())
}

pub fn new_state(text: &str) -> WorkflowState {
    WorkflowState::new("thread-1", Conversation::new(), text)
}

pub fn browser_state_call(id: &str) -> ToolCall {
    ToolCall::new(id, "get_browser_state", json!({"description": "current url"}))
}

pub fn js_call(id: &str) -> ToolCall {
    ToolCall::new(
        id,
        "execute_javascript",
        json!({"description": "read title", "js_code": "async function main(context) { return document.title; }"}),
    )
}

pub fn other_call(id: &str) -> ToolCall {
    ToolCall::new(id, "some_other_tool", json!({}))
}
