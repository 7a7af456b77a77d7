pub mod llm_client;

pub use llm_client::{compose_prompt, CompletionClient, OpenAiCompletionClient};
