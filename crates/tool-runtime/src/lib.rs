pub mod conversation;
pub mod events;
pub mod gate;
pub mod model;
pub mod policy;
pub mod registry;
pub mod resume;
pub mod runtime;
pub mod tool;
pub mod tools;
pub mod workflow;

pub use conversation::{Conversation, Message, Role};
pub use events::{TurnReport, WorkflowEvent};
pub use gate::{GateVerdict, InterruptGate};
pub use model::{ModelClient, ModelError, ModelRequest};
pub use policy::{DecisionKind, InterceptPolicy, PolicyError};
pub use registry::{RegistryError, ToolRegistry};
pub use resume::{ResumeError, ResumeHandler, ResumeOutcome};
pub use runtime::{Orchestrator, OrchestratorError};
pub use tool::{Tool, ToolCall, ToolContext, ToolDefinition, ToolError};
pub use tools::{register_browser_tools, ExecuteJavascriptTool, GetBrowserStateTool};
pub use workflow::{Decision, DecisionRequest, Phase, RequestStatus, WorkflowError, WorkflowState};
