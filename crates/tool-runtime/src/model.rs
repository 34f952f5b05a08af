use crate::conversation::Message;
use crate::tool::ToolDefinition;
use async_trait::async_trait;

/// Everything the model sees on one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

/// Trait for chat models that can propose tool calls.
///
/// Retries are the implementation's business; the loop surfaces failures as-is.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Return the assistant reply to `request`. The reply must have role
    /// `assistant` and may carry tool calls.
    async fn complete(&self, request: ModelRequest) -> Result<Message, ModelError>;

    /// Model name for logging/debugging (e.g., "gpt-4o")
    fn model_name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The model could not be reached or did not answer.
    #[error("model unavailable: {0}")]
    Unavailable(String),
    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },
    #[error("malformed model reply: {0}")]
    MalformedReply(String),
    #[error("model client not configured: {0}")]
    NotConfigured(String),
}

/// Mock model client for testing the loop without real API calls.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::tool::ToolCall;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Returns pre-configured replies in FIFO order and records every request.
    /// The `queue_*` methods chain.
    pub struct MockModelClient {
        replies: Mutex<VecDeque<Result<Message, ModelError>>>,
        requests: Mutex<Vec<ModelRequest>>,
        delay: Option<Duration>,
    }

    impl MockModelClient {
        pub fn new() -> Self {
            Self {
                replies: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        /// Sleep this long before answering each call.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn queue_reply(&self, reply: Message) -> &Self {
            self.replies.lock().unwrap().push_back(Ok(reply));
            self
        }

        /// Queue a plain text reply (ends the turn).
        pub fn queue_text(&self, text: &str) -> &Self {
            self.queue_reply(Message::assistant(text, vec![]))
        }

        pub fn queue_tool_calls(&self, tool_calls: Vec<ToolCall>) -> &Self {
            self.queue_reply(Message::assistant("", tool_calls))
        }

        pub fn queue_error(&self, error: ModelError) -> &Self {
            self.replies.lock().unwrap().push_back(Err(error));
            self
        }

        /// Requests received so far, oldest first.
        pub fn requests(&self) -> Vec<ModelRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl Default for MockModelClient {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ModelClient for MockModelClient {
        async fn complete(&self, request: ModelRequest) -> Result<Message, ModelError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ModelError::Unavailable("no reply queued".to_string())))
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }
}
