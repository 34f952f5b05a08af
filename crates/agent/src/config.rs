//! File-based agent configuration: the interrupt policy (YAML) and the
//! system prompt.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use pilot_tool_runtime::{DecisionKind, InterceptPolicy, PolicyError};

/// Prompt used when no `PILOT_SYSTEM_PROMPT_FILE` is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a browser automation assistant. \
Use get_browser_state to learn what the page currently shows and execute_javascript \
to act on it. The user may answer a tool call on your behalf or decline it; take \
their answer as the tool result and continue. Reply in plain text once the task is \
done or cannot be done.";

/// On-disk policy layout:
///
/// ```yaml
/// interrupt_on:
///   execute_javascript:
///     allowed_decisions: [respond]
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyFile {
    #[serde(default)]
    pub interrupt_on: BTreeMap<String, InterruptRule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterruptRule {
    pub allowed_decisions: Vec<DecisionKind>,
}

impl TryFrom<PolicyFile> for InterceptPolicy {
    type Error = PolicyError;

    fn try_from(file: PolicyFile) -> Result<Self, Self::Error> {
        let mut policy = InterceptPolicy::new();
        for (tool, rule) in file.interrupt_on {
            policy.insert(tool, rule.allowed_decisions)?;
        }
        Ok(policy)
    }
}

/// Parse a policy from YAML text.
pub fn parse_policy(yaml: &str, origin: &Path) -> Result<InterceptPolicy, AgentConfigError> {
    let file: PolicyFile = serde_yaml::from_str(yaml)
        .map_err(|e| AgentConfigError::Parse(origin.to_path_buf(), e))?;
    InterceptPolicy::try_from(file).map_err(|e| AgentConfigError::Policy(origin.to_path_buf(), e))
}

/// Load the policy at `path`, or the reference policy when `path` is `None`.
pub fn load_policy(path: Option<&Path>) -> Result<InterceptPolicy, AgentConfigError> {
    let Some(path) = path else {
        info!("using reference interrupt policy");
        return Ok(InterceptPolicy::reference());
    };

    let content = std::fs::read_to_string(path)
        .map_err(|e| AgentConfigError::IoError(path.to_path_buf(), e))?;
    let policy = parse_policy(&content, path)?;
    info!(
        path = %path.display(),
        gated_tools = ?policy.gated_tools().collect::<Vec<_>>(),
        "loaded interrupt policy"
    );
    Ok(policy)
}

/// Load the system prompt at `path`, or [`DEFAULT_SYSTEM_PROMPT`].
pub fn load_system_prompt(path: Option<&Path>) -> Result<String, AgentConfigError> {
    match path {
        Some(path) => {
            let prompt = std::fs::read_to_string(path)
                .map_err(|e| AgentConfigError::IoError(path.to_path_buf(), e))?;
            let prompt = prompt.trim().to_string();
            if prompt.is_empty() {
                return Err(AgentConfigError::EmptyPrompt(path.to_path_buf()));
            }
            Ok(prompt)
        }
        None => Ok(DEFAULT_SYSTEM_PROMPT.to_string()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentConfigError {
    #[error("I/O error reading {0}: {1}")]
    IoError(PathBuf, std::io::Error),
    #[error("YAML parse error in {0}: {1}")]
    Parse(PathBuf, serde_yaml::Error),
    #[error("invalid policy in {0}: {1}")]
    Policy(PathBuf, PolicyError),
    #[error("system prompt file is empty: {0}")]
    EmptyPrompt(PathBuf),
}
