//! Minimal client for OpenAI-compatible chat completion endpoints.
//!
//! Talks to the hosted OpenAI API or to any server exposing the same
//! `/chat/completions` route (Ollama serves one at
//! `http://localhost:11434/v1`).
//!
//! # Example
//!
//! ```rust,ignore
//! use openai_client::{ChatRequest, Message, OpenAIClient};
//!
//! let client = OpenAIClient::new("ollama").with_base_url("http://localhost:11434/v1");
//!
//! let response = client
//!     .chat_completion(ChatRequest::new("llama3.2").message(Message::user("Hello!")))
//!     .await?;
//!
//! let mut stream = client
//!     .chat_completion_stream(ChatRequest::new("llama3.2").message(Message::user("Hello!")))
//!     .await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?.delta);
//! }
//! ```

pub mod error;
pub mod schema;
pub mod streaming;
pub mod types;

pub use error::{OpenAIError, Result};
pub use schema::StructuredOutput;
pub use streaming::{ChatCompletionChunk, ChatCompletionStream};
pub use types::*;

use reqwest::{header, Client, Response};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat client.
#[derive(Clone)]
pub struct OpenAIClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    /// Client for the hosted API with the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at another OpenAI-compatible server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Chat completion, waiting for the whole reply.
    pub async fn chat_completion(&self, mut request: ChatRequest) -> Result<ChatResponse> {
        let start = std::time::Instant::now();
        request.stream = None;

        let response = self.post_chat(&request).await?;
        let raw: types::ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| OpenAIError::Parse(e.to_string()))?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| OpenAIError::Model("Response contained no choices".into()))?;

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis() as u64,
            total_tokens = raw.usage.as_ref().map(|u| u.total_tokens),
            "Chat completion finished"
        );

        Ok(ChatResponse {
            content,
            usage: raw.usage,
        })
    }

    /// Chat completion delivered as server-sent events.
    ///
    /// The returned stream yields one [`ChatCompletionChunk`] per event and
    /// ends after the `[DONE]` terminator or when the connection closes.
    pub async fn chat_completion_stream(
        &self,
        mut request: ChatRequest,
    ) -> Result<ChatCompletionStream> {
        request.stream = Some(true);

        let response = self.post_chat(&request).await?;
        debug!(model = %request.model, "Chat completion stream opened");

        Ok(ChatCompletionStream::new(response.bytes_stream()))
    }

    async fn post_chat(&self, request: &ChatRequest) -> Result<Response> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, model = %request.model, "Chat request failed");
                OpenAIError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Chat API error");
            return Err(OpenAIError::Status {
                status: status.as_u16(),
                body: error_text,
            });
        }

        Ok(response)
    }
}
