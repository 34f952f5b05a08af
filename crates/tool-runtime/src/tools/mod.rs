//! Built-in tool implementations.

pub mod browser;

pub use browser::{ExecuteJavascriptTool, GetBrowserStateTool};

use crate::registry::{RegistryError, ToolRegistry};

/// Register the browser automation tools.
pub fn register_browser_tools(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(ExecuteJavascriptTool)?;
    registry.register(GetBrowserStateTool)?;
    Ok(())
}
