pub mod builder;
pub mod config;
pub mod service;
pub mod store;

pub use builder::{build_orchestrator, build_service, build_service_with};
pub use config::{load_policy, load_system_prompt, AgentConfigError};
pub use service::{PendingDecision, ServiceError, StepOutcome, ThreadService, ThreadSnapshot};
pub use store::{FileWorkflowStore, MemoryWorkflowStore, ThreadSummary, WorkflowStore};
