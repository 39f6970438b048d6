use async_trait::async_trait;
use futures::StreamExt;
use log::{ debug, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{ ChatClient, ChatError, CompletionResponse, PromptMessage, TokenStream };
use crate::llm::LlmConfig;

const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub struct GroqChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct GroqRequest<'a> {
    messages: &'a [PromptMessage],
    model: String,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct GroqResponse {
    choices: Vec<GroqChoice>,
}

#[derive(Deserialize)]
struct GroqChoice {
    message: PromptMessage,
}

#[derive(Deserialize)]
struct GroqStreamResponse {
    choices: Vec<GroqStreamChoice>,
}

#[derive(Deserialize)]
struct GroqStreamChoice {
    delta: GroqDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GroqDelta {
    content: Option<String>,
}

impl GroqChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        max_tokens: u32,
        temperature: f32
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let chat_model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| format!("Invalid API key format: {}", e))?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;

        Ok(Self {
            http,
            model: chat_model,
            base_url: api_url,
            max_tokens,
            temperature,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_key = config.api_key.clone().ok_or_else(|| "Groq API key is required".to_string())?;
        Self::new(
            api_key,
            config.model.clone(),
            config.base_url.clone(),
            config.max_tokens,
            config.temperature
        )
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatClient for GroqChatClient {
    async fn complete(
        &self,
        messages: &[PromptMessage]
    ) -> Result<CompletionResponse, ChatError> {
        let req = GroqRequest {
            messages,
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: None,
        };

        let resp = self.http
            .post(self.completions_url())
            .json(&req)
            .send().await
            .map_err(|e| ChatError::ModelUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChatError::ModelUnavailable(e.to_string()))?
            .json::<GroqResponse>().await
            .map_err(|e| ChatError::ModelUnavailable(e.to_string()))?;

        let content = resp.choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| ChatError::ModelUnavailable("empty response from model".to_string()))?;

        Ok(CompletionResponse { response: content })
    }

    async fn stream_completion(
        &self,
        messages: &[PromptMessage]
    ) -> Result<TokenStream, ChatError> {
        let url = self.completions_url();
        let req = GroqRequest {
            messages,
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: Some(true),
        };

        info!("Starting model stream request to {}", url);

        // The request is sent before anything is spawned so that a provider
        // that cannot start a stream fails here, before any fragment exists.
        let resp = self.http
            .post(&url)
            .json(&req)
            .send().await
            .map_err(|e| ChatError::ModelUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChatError::ModelUnavailable(e.to_string()))?;

        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut stream = resp.bytes_stream();
            // Chunks can split SSE lines; carry the incomplete tail over.
            let mut pending = String::new();

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(Box::new(e) as _)).await;
                        return;
                    }
                };

                pending.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline_pos) = pending.find('\n') {
                    let line = pending[..newline_pos].trim_end_matches('\r').to_string();
                    pending.drain(..=newline_pos);

                    if line.is_empty() || line == "data: [DONE]" {
                        continue;
                    }
                    let data = match line.strip_prefix("data: ") {
                        Some(data) => data,
                        None => {
                            continue;
                        }
                    };
                    let parsed = match serde_json::from_str::<GroqStreamResponse>(data) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            debug!("Skipping unparseable stream chunk: {}", e);
                            continue;
                        }
                    };

                    for choice in parsed.choices {
                        if let Some(content) = choice.delta.content {
                            if !content.is_empty() && tx.send(Ok(content)).await.is_err() {
                                // Receiver dropped: the caller disconnected.
                                return;
                            }
                        }
                        if choice.finish_reason.as_deref() == Some("stop") {
                            return;
                        }
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
