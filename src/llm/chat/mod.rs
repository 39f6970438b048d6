pub mod groq;
pub mod service;

use async_trait::async_trait;
use futures::Stream;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use super::LlmConfig;
use self::groq::GroqChatClient;

pub use self::service::ChatService;

/// A finite, single-pass sequence of text fragments from the model. Items
/// after the first may fail; a failed item ends the stream.
pub type TokenStream = Pin<
    Box<dyn Stream<Item = Result<String, Box<dyn StdError + Send + Sync>>> + Send>
>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("model unavailable: {0}")] ModelUnavailable(String),
}

/// One message in the prompt sent upstream. Roles follow the OpenAI-style
/// wire format ("system" | "user" | "assistant").
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self { role: role.to_string(), content: content.to_string() }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[PromptMessage]
    ) -> Result<CompletionResponse, ChatError>;

    /// Must fail with `ModelUnavailable` before yielding anything when the
    /// upstream call cannot start; mid-stream failures arrive as an `Err`
    /// item instead.
    async fn stream_completion(
        &self,
        messages: &[PromptMessage]
    ) -> Result<TokenStream, ChatError>;
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client = GroqChatClient::from_config(config)?;
    Ok(Arc::new(client))
}
