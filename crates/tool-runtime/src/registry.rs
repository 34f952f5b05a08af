use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    definition: ToolDefinition,
    validator: jsonschema::Validator,
}

/// Manages available tools, their schemas, and lookup.
///
/// Built once at startup and shared behind `Arc`; nothing mutates it after
/// that, so concurrent conversations read it without locking.
pub struct ToolRegistry {
    tools: IndexMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: IndexMap::new(),
        }
    }

    /// Register a tool. Returns error if the name is taken or its input schema
    /// is not a valid JSON Schema.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        let definition = tool.definition();
        if self.tools.contains_key(&definition.name) {
            return Err(RegistryError::DuplicateName(definition.name));
        }
        let validator = jsonschema::validator_for(&definition.input_schema).map_err(|e| {
            RegistryError::InvalidSchema {
                tool: definition.name.clone(),
                reason: e.to_string(),
            }
        })?;
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                tool: Arc::new(tool),
                definition,
                validator,
            },
        );
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.tool.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All registered tool definitions in registration order (sent to the model).
    pub fn describe(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    /// Check `arguments` against the tool's input schema without running it.
    pub fn validate(&self, name: &str, arguments: &Value) -> Result<(), RegistryError> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?;
        let violations: Vec<String> = entry
            .validator
            .iter_errors(arguments)
            .map(|e| e.to_string())
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::InvalidArguments {
                tool: name.to_string(),
                reason: violations.join("; "),
            })
        }
    }

    /// Validate and execute a tool, returning its text result.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Value,
        context: &ToolContext,
    ) -> Result<String, RegistryError> {
        self.validate(name, &arguments)?;
        let tool = self
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?;

        debug!(tool = name, call_id = %context.call_id, "invoking tool");
        tool.execute(arguments, context)
            .await
            .map_err(|source| match source {
                ToolError::InvalidInput(reason) => RegistryError::InvalidArguments {
                    tool: name.to_string(),
                    reason,
                },
                other => RegistryError::Execution {
                    tool: name.to_string(),
                    source: other,
                },
            })
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool with name '{0}' is already registered")]
    DuplicateName(String),
    #[error("Tool '{tool}' has an invalid input schema: {reason}")]
    InvalidSchema { tool: String, reason: String },
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error("Tool '{tool}' failed: {source}")]
    Execution {
        tool: String,
        #[source]
        source: ToolError,
    },
}
