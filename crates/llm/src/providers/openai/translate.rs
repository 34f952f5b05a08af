//! Translation between conversation types and the OpenAI chat completions format.

use serde_json::{json, Value};

use pilot_tool_runtime::{Message, ModelError, ModelRequest, Role, ToolCall, ToolDefinition};

/// Translate a [`ToolDefinition`] into an OpenAI function tool.
pub(super) fn tool_definition_to_openai(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        }
    })
}

/// Translate a [`Message`] into an OpenAI chat message object.
pub(super) fn message_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::User => json!({
            "role": "user",
            "content": msg.content,
        }),
        Role::Assistant => {
            let mut value = json!({ "role": "assistant" });
            value["content"] = if msg.content.is_empty() && msg.has_tool_calls() {
                Value::Null
            } else {
                Value::String(msg.content.clone())
            };
            if msg.has_tool_calls() {
                value["tool_calls"] = msg
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
            }
            value
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.as_deref().unwrap_or_default(),
            "content": msg.content,
        }),
    }
}

/// Build the request body for `/chat/completions`.
pub(super) fn request_body(
    model: &str,
    request: &ModelRequest,
    temperature: f32,
    max_tokens: Option<u32>,
) -> Value {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = &request.system_prompt {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.extend(request.messages.iter().map(message_to_openai));

    let mut body = json!({
        "model": model,
        "messages": messages,
        "temperature": temperature,
    });
    if !request.tools.is_empty() {
        body["tools"] = request.tools.iter().map(tool_definition_to_openai).collect();
    }
    if let Some(max_tokens) = max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    body
}

/// Turn a chat completion response into an assistant [`Message`].
///
/// Arguments that are not valid JSON become `null`; the registry's schema
/// check then reports them to the model as a failed call.
pub(super) fn parse_completion(resp: &Value) -> Result<Message, ModelError> {
    let message = resp
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| ModelError::MalformedReply("missing choices[0].message".into()))?;

    let content = message["content"].as_str().unwrap_or_default().to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let id = call["id"]
                .as_str()
                .ok_or_else(|| ModelError::MalformedReply("tool call without id".into()))?;
            let name = call["function"]["name"].as_str().ok_or_else(|| {
                ModelError::MalformedReply(format!("tool call {id} without function name"))
            })?;
            let arguments = match &call["function"]["arguments"] {
                Value::String(raw) if raw.trim().is_empty() => json!({}),
                Value::String(raw) => serde_json::from_str(raw).unwrap_or(Value::Null),
                Value::Null => json!({}),
                other => other.clone(),
            };
            tool_calls.push(ToolCall::new(id, name, arguments));
        }
    }

    Ok(Message::assistant(content, tool_calls))
}
