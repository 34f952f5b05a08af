//! Wires the browser agent together from [`Config`].

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use pilot_core::config::AgentConfig;
use pilot_core::Config;
use pilot_tool_runtime::{register_browser_tools, ModelClient, Orchestrator, ToolRegistry};

use crate::config::{load_policy, load_system_prompt};
use crate::service::ThreadService;
use crate::store::{FileWorkflowStore, WorkflowStore};

/// Registry holding the two browser tools.
pub fn browser_registry() -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_browser_tools(&mut registry).context("failed to register browser tools")?;
    Ok(registry)
}

/// Orchestrator over the browser tools with the configured policy and limits.
pub fn build_orchestrator(agent: &AgentConfig, model: Arc<dyn ModelClient>) -> Result<Orchestrator> {
    let policy = load_policy(agent.policy_file.as_deref())?;
    let registry = browser_registry()?;
    Ok(Orchestrator::new(model, Arc::new(registry), Arc::new(policy))
        .with_max_rounds(agent.max_rounds)
        .with_tool_concurrency(agent.tool_concurrency))
}

/// Thread service backed by `store` and the given model.
pub fn build_service_with(
    config: &Config,
    model: Arc<dyn ModelClient>,
    store: Arc<dyn WorkflowStore>,
) -> Result<ThreadService> {
    let system_prompt = load_system_prompt(config.agent.system_prompt_file.as_deref())?;
    let orchestrator = build_orchestrator(&config.agent, model)?;
    Ok(ThreadService::new(Arc::new(orchestrator), store).with_system_prompt(system_prompt))
}

/// Production composition: configured model client and file store.
pub fn build_service(config: &Config) -> Result<ThreadService> {
    config.log_summary();
    let model = pilot_llm::create_model_client(&config.llm)
        .context("failed to create model client")?;
    let store = FileWorkflowStore::new(&config.storage.data_dir)?;
    info!(
        model = model.model_name(),
        data_dir = %config.storage.data_dir.display(),
        max_rounds = config.agent.max_rounds,
        "browser agent ready"
    );
    build_service_with(config, model, Arc::new(store))
}
