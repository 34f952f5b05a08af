pub mod providers;

pub use providers::create_model_client;
pub use providers::openai::OpenAiChatClient;
