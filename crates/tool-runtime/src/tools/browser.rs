//! Browser automation tools.
//!
//! The page lives in the user's browser, not here. In the backend both tools
//! are placeholders: their text only says the work is pending on the client.
//! The real result normally arrives as a `respond` decision after the client
//! has run the call, which is why both are gated by the reference policy.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError};

pub const EXECUTE_JAVASCRIPT: &str = "execute_javascript";
pub const GET_BROWSER_STATE: &str = "get_browser_state";

/// Characters of `js_code` echoed back in the placeholder result.
const CODE_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
struct ExecuteJavascriptArgs {
    description: String,
    js_code: String,
    #[serde(default = "default_wait_after_run")]
    wait_after_run: u64,
    #[serde(default)]
    wait_before_run: u64,
}

fn default_wait_after_run() -> u64 {
    2
}

/// Run JavaScript in the current page (async/await supported).
pub struct ExecuteJavascriptTool;

#[async_trait]
impl Tool for ExecuteJavascriptTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: EXECUTE_JAVASCRIPT.to_string(),
            description: "Execute JavaScript in the current page; async/await is supported. \
                Use with care. The code must define a main function:\n\n\
                async function main(context) {\n    // all logic goes here\n    let log = \"\";\n    log += \"Hello world\";\n    return log;\n}"
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "description": {
                        "type": "string",
                        "description": "What you intend to do with this code"
                    },
                    "js_code": {
                        "type": "string",
                        "description": "JavaScript to execute. Must contain an `async function main(context)` whose return value is the result."
                    },
                    "wait_after_run": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Seconds to wait after running (default 2)"
                    },
                    "wait_before_run": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Seconds to wait before running (default 0)"
                    }
                },
                "required": ["description", "js_code"]
            }),
        }
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<String, ToolError> {
        let args: ExecuteJavascriptArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidInput(e.to_string()))?;

        debug!(
            call_id = %context.call_id,
            description = %args.description,
            code_len = args.js_code.len(),
            "javascript execution deferred to client"
        );

        let preview: String = args.js_code.chars().take(CODE_PREVIEW_CHARS).collect();
        Ok(format!(
            "JavaScript execution pending on the client:\n\
             - description: {}\n\
             - code: {}...\n\
             - wait before: {}s\n\
             - wait after: {}s\n",
            args.description, preview, args.wait_before_run, args.wait_after_run
        ))
    }
}

#[derive(Debug, Deserialize)]
struct GetBrowserStateArgs {
    description: String,
}

/// Read browser state (URL, DOM summary, tabs...) as described by the model.
pub struct GetBrowserStateTool;

#[async_trait]
impl Tool for GetBrowserStateTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: GET_BROWSER_STATE.to_string(),
            description: "Get the browser state needed for the task.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "description": {
                        "type": "string",
                        "description": "Which browser information you want"
                    }
                },
                "required": ["description"]
            }),
        }
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<String, ToolError> {
        let args: GetBrowserStateArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidInput(e.to_string()))?;

        debug!(call_id = %context.call_id, description = %args.description, "browser state requested");
        Ok(format!(
            "Browser state for \"{}\" is pending on the client",
            args.description
        ))
    }
}
