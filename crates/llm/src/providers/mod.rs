pub mod openai;

use std::sync::Arc;

use pilot_core::config::LlmConfig;
use pilot_tool_runtime::{ModelClient, ModelError};

/// Create the model client selected by `llm_config.provider`.
pub fn create_model_client(llm_config: &LlmConfig) -> Result<Arc<dyn ModelClient>, ModelError> {
    match llm_config.provider.as_str() {
        "openai" => {
            let api_key = llm_config
                .api_key
                .as_ref()
                .ok_or_else(|| ModelError::NotConfigured("OPENAI_API_KEY not set".into()))?;
            let base_url = llm_config
                .base_url
                .as_deref()
                .unwrap_or(openai::DEFAULT_BASE_URL);
            let client = openai::OpenAiChatClient::new(
                api_key.clone(),
                llm_config.model.clone(),
                base_url.to_string(),
            )
            .with_temperature(llm_config.temperature)
            .with_max_tokens(llm_config.max_tokens);
            Ok(Arc::new(client))
        }
        other => Err(ModelError::NotConfigured(format!(
            "unknown LLM provider: '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llm_config(provider: &str, api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            model: "gpt-4o".to_string(),
            api_key: api_key.map(str::to_string),
            base_url: None,
            temperature: 0.0,
            max_tokens: None,
        }
    }

    #[test]
    fn test_openai_client_created() {
        let client = create_model_client(&llm_config("openai", Some("sk-test"))).unwrap();
        assert_eq!(client.model_name(), "gpt-4o");
    }

    #[test]
    fn test_missing_api_key() {
        let err = create_model_client(&llm_config("openai", None)).err().unwrap();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_unknown_provider() {
        let err = create_model_client(&llm_config("mystery", Some("k"))).err().unwrap();
        assert!(matches!(err, ModelError::NotConfigured(_)));
    }
}
