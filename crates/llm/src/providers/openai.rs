//! OpenAI chat completions implementation of [`ModelClient`].
//!
//! Works against any endpoint that speaks the `/chat/completions` protocol
//! with function tools.

mod translate;

use async_trait::async_trait;
use tracing::{debug, warn};

use pilot_tool_runtime::{Message, ModelClient, ModelError, ModelRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiChatClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAiChatClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ModelClient for OpenAiChatClient {
    async fn complete(&self, request: ModelRequest) -> Result<Message, ModelError> {
        let url = self.endpoint();
        let body = translate::request_body(&self.model, &request, self.temperature, self.max_tokens);

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "OpenAI request to {}",
            url
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "OpenAI API error");
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let resp: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModelError::MalformedReply(e.to_string()))?;
        let reply = translate::parse_completion(&resp)?;

        debug!(
            model = %self.model,
            tool_calls = reply.tool_calls.len(),
            "OpenAI reply received"
        );
        Ok(reply)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
